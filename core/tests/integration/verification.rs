use mockdb_core::{named_params, params, Builder, CommandKind, StatementPattern, Value};

use crate::common::{connection, widget};

#[test]
fn test_should_have_inserted_names_the_missing_table() {
    let conn = connection();
    conn.setup_for_non_query(1);
    conn.execute(
        "Insert INTO Widgets (Id, Name) VALUES (@Id,@Name)",
        named_params! { "@Id": 1, "@Name": "foo" },
    )
    .unwrap();

    let ledger = conn.ledger();
    ledger
        .should_have_inserted("Widgets", &["Id", "Name"])
        .unwrap();

    let err = ledger
        .should_have_inserted("Gadgets", &["Id", "Name"])
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Gadgets"), "{message}");
    assert!(message.contains("Insert INTO Widgets (Id, Name)"), "{message}");
}

#[test]
fn test_insert_values_from_object() {
    let conn = connection();
    conn.setup_for_non_query(1);
    conn.execute(
        "INSERT INTO [dbo].[Widgets] ([Id], [Name]) VALUES (@Id, @Name)",
        named_params! { "@Id": 3, "@Name": "gear" },
    )
    .unwrap();

    let ledger = conn.ledger();
    ledger
        .should_have(&StatementPattern::insert("Widgets").values_from(&widget(3, "gear")))
        .unwrap();
    let err = ledger
        .should_have(
            &StatementPattern::insert("Widgets")
                .values_from(&widget(3, "cog"))
                .message("saving widget 3"),
        )
        .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("saving widget 3: "), "{message}");
    assert!(message.contains("Name"), "{message}");
}

#[test]
fn test_update_ran_twice_with_different_parameters() {
    let conn = connection();
    conn.setup_for_non_query(1);
    let mut cmd = conn
        .prepare("UPDATE Widgets SET Name = @Name WHERE Id = @Id")
        .unwrap();
    for (id, name) in [(1, "a"), (2, "b")] {
        cmd.parameters_mut().clear();
        cmd.bind(named_params! { "@Id": id, "@Name": name }).unwrap();
        cmd.execute_non_query().unwrap();
    }

    let ledger = conn.ledger();
    let update = StatementPattern::update("Widgets").column("Name").where_eq("Id");
    ledger.should_have_executed_n_times(&update, 2).unwrap();
    assert!(ledger.should_have_executed_n_times(&update, 1).is_err());

    let second = StatementPattern::update("Widgets")
        .column_value("Name", "b")
        .where_value("Id", 2);
    ledger.should_have_executed_n_times(&second, 1).unwrap();
    ledger.should_have(&second.clone().last()).unwrap();
    assert!(ledger.should_have(&second.first()).is_err());

    cmd.ledger().should_have_updated("Widgets", &["Name"]).unwrap();
}

#[test]
fn test_delete_and_select() {
    let conn = connection();
    conn.setup_for_non_query(1).setup_for_scalar(0);
    conn.execute("DELETE FROM Widgets WHERE Id = ?", params![4])
        .unwrap();
    conn.query_scalar("SELECT COUNT(*) FROM Widgets WHERE Id = ?", params![4])
        .unwrap();

    let ledger = conn.ledger();
    ledger.should_have_deleted("Widgets").unwrap();
    ledger
        .should_have(&StatementPattern::delete("Widgets").where_value("Id", 4))
        .unwrap();
    ledger
        .should_have(&StatementPattern::select("Widgets").where_value("Id", 4))
        .unwrap();
    assert!(ledger.should_have_selected("Widgets", &["Name"]).is_err());
    assert!(ledger.should_have_deleted("Gadgets").is_err());
}

#[test]
fn test_insert_batched_with_identity_select() {
    let conn = connection();
    conn.setup_for_scalar(1).setup_for_scalar(2);
    let sql = "INSERT INTO Widgets (Id, Name) VALUES (@Id, @Name); SELECT SCOPE_IDENTITY()";
    conn.query_scalar(sql, named_params! { "@Id": 1, "@Name": "foo" })
        .unwrap();

    let ledger = conn.ledger();
    ledger
        .should_have(
            &StatementPattern::insert("Widgets")
                .column_value("Id", 1)
                .column_value("Name", "foo"),
        )
        .unwrap();

    conn.query_scalar(sql, named_params! { "@Id": 2 }).unwrap();
    let err = conn
        .ledger()
        .should_have(&StatementPattern::insert("Widgets").column("Name").last())
        .unwrap_err();
    assert!(err.to_string().contains("`@Name`"), "{err}");
}

#[test]
fn test_multi_row_insert() {
    let conn = connection();
    conn.setup_for_non_query(2);
    conn.execute(
        "INSERT INTO Widgets (Id, Name) VALUES (@Id1, @Name1), (@Id2, @Name2)",
        named_params! { "@Id1": 1, "@Name1": "foo", "@Id2": 2, "@Name2": "bar" },
    )
    .unwrap();

    let ledger = conn.ledger();
    ledger
        .should_have(&StatementPattern::insert("Widgets").column_value("Name", "foo"))
        .unwrap();
    assert!(ledger
        .should_have(&StatementPattern::insert("Widgets").column_value("Name", "bar"))
        .is_err());
}

#[test]
fn test_stored_procedure_call() {
    let conn = connection();
    conn.setup_for_non_query(12);
    let mut cmd = conn.prepare_procedure("dbo.PurgeWidgets").unwrap();
    cmd.bind(named_params! { "@OlderThanDays": 30 }).unwrap();
    assert_eq!(cmd.execute_non_query().unwrap(), 12);

    let ledger = conn.ledger();
    let found = ledger.should_have_executed_procedure("PurgeWidgets").unwrap();
    assert_eq!(found.kind(), CommandKind::StoredProcedure);
    ledger
        .should_have(&StatementPattern::procedure("dbo.PurgeWidgets").column_value("OlderThanDays", 30))
        .unwrap();
    assert!(ledger
        .should_have(&StatementPattern::procedure("PurgeWidgets").column("DryRun"))
        .is_err());
}

#[test]
fn test_predicate_assertions_and_cancel() {
    let conn = connection();
    conn.setup_for_scalar(1);
    let mut cmd = conn.prepare("SELECT COUNT(*) FROM Widgets").unwrap();
    cmd.execute_scalar().unwrap();
    cmd.cancel();

    let ledger = conn.ledger();
    let cancelled = ledger.should_have_executed(|i| i.is_cancelled()).unwrap();
    assert!(cancelled.cancelled_at().unwrap() >= cancelled.executed_at());
    ledger
        .should_have_executed_times(|i| i.text().contains("COUNT"), 1)
        .unwrap();
    ledger
        .should_not_have_executed(|i| i.parameters().contains("Id"))
        .unwrap();
}

#[test]
fn test_transaction_outcomes() {
    let conn = Builder::new().build();
    conn.setup_for_non_query(1);
    {
        let tx = conn.begin_transaction().unwrap();
        let mut cmd = tx.prepare("DELETE FROM Widgets").unwrap();
        cmd.set_transaction(Some(&tx)).unwrap();
        cmd.execute_non_query().unwrap();
    }
    let ledger = conn.ledger();
    ledger.should_have_rolled_back().unwrap();
    assert!(ledger.should_have_committed().is_err());
    ledger
        .should_have_executed(|i| i.transaction() == Some(1) && i.parameters().is_empty())
        .unwrap();
    assert_eq!(
        conn.last_invocation().unwrap().parameter("Missing").ok(),
        None::<&Value>
    );
}
