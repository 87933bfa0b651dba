use mockdb_core::{
    named_params, params, Builder, Error, ExhaustedPolicy, ResultSet, Value, ValueType,
};

use crate::common::{connection, widget};

#[test]
fn test_query_yields_configured_row() {
    let conn = connection();
    conn.setup_for_query(
        ResultSet::with_column_names(&["Id", "Name"], vec![vec![1.into(), "x".into()]]).unwrap(),
    );

    let mut reader = conn.query("SELECT Id, Name FROM Widgets", ()).unwrap();
    assert!(reader.read().unwrap());
    assert_eq!(reader.get::<i64>(0).unwrap(), 1);
    assert_eq!(reader.get_by_name::<String>("Name").unwrap(), "x");
    assert!(!reader.read().unwrap());
}

#[test]
fn test_scalars_answer_in_order() {
    let conn = connection();
    conn.setup_for_scalar(5).setup_for_scalar("ok");

    let mut first = conn.prepare("SELECT COUNT(*) FROM Widgets").unwrap();
    let mut second = conn.prepare("SELECT Status FROM Jobs").unwrap();
    assert_eq!(first.execute_scalar().unwrap(), Value::Integer(5));
    assert_eq!(second.execute_scalar().unwrap(), Value::from("ok"));
}

#[test]
fn test_objects_become_rows() {
    let conn = connection();
    conn.setup_for_objects(&[widget(1, "a"), widget(2, "b")])
        .unwrap();

    let mut reader = conn.query("SELECT * FROM Widgets", ()).unwrap();
    assert_eq!(reader.field_count(), 2);
    assert_eq!(reader.column_type(0).unwrap(), ValueType::Integer);
    assert_eq!(reader.columns()[1].max_size, Some(50));
    let mut names = Vec::new();
    while reader.read().unwrap() {
        names.push(reader.get::<String>(1).unwrap());
    }
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn test_exhausted_queue_fails_at_the_extra_command() {
    let conn = connection();
    conn.setup_for_non_query(1);
    conn.execute("DELETE FROM Widgets WHERE Id = ?", params![1])
        .unwrap();
    let err = conn
        .execute("DELETE FROM Widgets WHERE Id = ?", params![2])
        .unwrap_err();
    assert!(matches!(err, Error::QueueExhausted(_)));
    assert!(err.to_string().contains("DELETE FROM Widgets"));
    assert_eq!(conn.invocations().len(), 1);
}

#[test]
fn test_exhausted_queue_policy_answers_empty() {
    let conn = Builder::new()
        .on_exhausted(ExhaustedPolicy::EmptyResponse)
        .build();
    let mut reader = conn.query("SELECT * FROM Widgets", ()).unwrap();
    assert!(!reader.has_rows());
    assert!(!reader.read().unwrap());
}

#[test]
fn test_server_error_after_recording() {
    let conn = connection();
    conn.setup_for_error("deadlock victim");
    let err = conn
        .execute(
            "UPDATE Widgets SET Name = @Name",
            named_params! { "@Name": "z" },
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "deadlock victim");
    assert_eq!(
        conn.last_invocation().unwrap().parameter("Name").unwrap(),
        &Value::from("z")
    );
}

#[test]
fn test_reused_command_keeps_snapshots() {
    let conn = connection();
    conn.setup_for_non_query(1);
    let mut cmd = conn.prepare("UPDATE Widgets SET Name = @Name WHERE Id = @Id").unwrap();
    cmd.bind(named_params! { "@Id": 1, "@Name": "first" }).unwrap();
    cmd.execute_non_query().unwrap();

    cmd.parameters_mut().get_mut("Name").unwrap().value = Value::from("second");
    cmd.parameters_mut().get_mut("Id").unwrap().value = Value::Integer(2);
    cmd.execute_non_query().unwrap();

    let ledger = conn.invocations();
    assert_eq!(ledger[0].parameter("Name").unwrap(), &Value::from("first"));
    assert_eq!(ledger[1].parameter("Name").unwrap(), &Value::from("second"));
    assert_eq!(ledger[1].parameter("@Id").unwrap(), &Value::Integer(2));
}
