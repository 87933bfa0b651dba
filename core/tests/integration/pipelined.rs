use mockdb_core::{Builder, Error, Responder, Value};

use crate::common::rows_of;

#[test]
fn test_one_reader_walks_every_queued_result() {
    let conn = Builder::new().pipelined(true).build();
    conn.setup_for_query(rows_of(2)).setup_for_query(rows_of(3));

    let mut cmd = conn.prepare("SELECT * FROM A; SELECT * FROM B").unwrap();
    let mut reader = cmd.execute_reader().unwrap();

    let mut sizes = Vec::new();
    while reader.next_result().unwrap() {
        let mut rows = 0;
        while reader.read().unwrap() {
            rows += 1;
        }
        sizes.push(rows);
    }
    assert_eq!(sizes, [2, 3]);
    assert_eq!(conn.invocations().len(), 1);
    assert_eq!(conn.pending_count(), 0);
}

#[test]
fn test_pipelined_failure_surfaces_on_next_result() {
    let conn = Builder::new().pipelined(true).build();
    conn.setup_for_query(rows_of(1))
        .queue(Responder::failure("conversion failed"));

    let mut reader = conn.query("EXEC dbo.Report", ()).unwrap();
    assert!(reader.is_bound());
    assert!(reader.next_result().unwrap());
    assert!(matches!(reader.next_result(), Err(Error::Database(_))));
}

#[test]
fn test_switching_modes() {
    let conn = Builder::new().build();
    conn.setup_for_query(rows_of(1)).setup_for_query(rows_of(4));

    let mut reader = conn.query("SELECT 1", ()).unwrap();
    assert!(!reader.is_bound());
    assert!(reader.read().unwrap());
    assert!(!reader.next_result().unwrap());

    conn.set_pipelined(true);
    let mut reader = conn.query("SELECT 2", ()).unwrap();
    assert!(reader.next_result().unwrap());
    assert!(reader.has_rows());
    assert!(!reader.next_result().unwrap());
}

#[test]
fn test_scalar_and_non_query_consume_the_queue() {
    let conn = Builder::new().pipelined(true).build();
    conn.setup_for_scalar(5).setup_for_non_query(2);

    assert_eq!(
        conn.query_scalar("SELECT COUNT(*) FROM Widgets", ()).unwrap(),
        Value::Integer(5)
    );
    assert_eq!(conn.pending_count(), 1);
    assert_eq!(conn.execute("DELETE FROM Widgets", ()).unwrap(), 2);
    assert_eq!(conn.pending_count(), 0);
    assert_eq!(conn.invocations().len(), 2);
}

#[test]
fn test_empty_queue_is_an_error_for_every_execution() {
    let conn = Builder::new().pipelined(true).build();

    let mut cmd = conn.prepare("DELETE FROM Widgets").unwrap();
    assert!(matches!(
        cmd.execute_non_query(),
        Err(Error::QueueExhausted(ref sql)) if sql == "DELETE FROM Widgets"
    ));
    assert!(matches!(
        conn.query_scalar("SELECT 1", ()),
        Err(Error::QueueExhausted(_))
    ));
    assert!(conn.invocations().is_empty());

    let mut reader = conn.query("SELECT * FROM Widgets", ()).unwrap();
    assert!(!reader.next_result().unwrap());
}
