use mockdb_core::{Builder, Parameter, ResultSet, TupleShape, Value};
use proptest::prelude::*;

use crate::common::{rows_of, Gadget, Owner, Widget};

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Integer),
        any::<bool>().prop_map(Value::Boolean),
        "[a-z]{0,8}".prop_map(Value::Text),
    ]
}

proptest! {
    #[test]
    fn kth_execution_gets_kth_responder(values in prop::collection::vec(value(), 1..16)) {
        let conn = Builder::new().build();
        for value in &values {
            conn.setup_for_scalar(value.clone());
        }
        for (k, expected) in values.iter().enumerate() {
            let actual = conn.query_scalar(&format!("SELECT {k}"), ()).unwrap();
            prop_assert_eq!(&actual, expected);
        }
        prop_assert_eq!(conn.pending_count(), 0);
    }

    #[test]
    fn pipelined_reader_yields_each_result_once(sizes in prop::collection::vec(0usize..6, 0..8)) {
        let conn = Builder::new().pipelined(true).build();
        for size in &sizes {
            conn.setup_for_query(rows_of(*size));
        }
        let mut reader = conn.query("SELECT * FROM Batches", ()).unwrap();
        let mut seen = Vec::new();
        while reader.next_result().unwrap() {
            let mut rows = 0;
            while reader.read().unwrap() {
                rows += 1;
            }
            seen.push(rows);
        }
        prop_assert_eq!(seen, sizes);
        prop_assert!(!reader.next_result().unwrap());
    }

    #[test]
    fn recorded_parameters_never_change(first in value(), second in value()) {
        let conn = Builder::new().build();
        conn.setup_for_non_query(1);
        let mut cmd = conn.prepare("UPDATE Widgets SET Name = @Name").unwrap();
        cmd.parameters_mut().add(Parameter::new("@Name", first.clone()));
        cmd.execute_non_query().unwrap();
        cmd.parameters_mut().get_mut("Name").unwrap().value = second.clone();
        cmd.execute_non_query().unwrap();

        let ledger = conn.invocations();
        prop_assert_eq!(ledger[0].parameter("Name").unwrap(), &first);
        prop_assert_eq!(ledger[1].parameter("Name").unwrap(), &second);
    }

    #[test]
    fn tuple_columns_are_the_sum_of_slots(count in 0usize..5) {
        let rows: Vec<(Widget, Owner)> = (0..count)
            .map(|i| (crate::common::widget(i as i64, "w"), Owner { name: format!("o{i}") }))
            .collect();
        let rs = ResultSet::from_tuples(&rows).unwrap();
        prop_assert_eq!(rs.column_count(), 2 + 1);
        prop_assert_eq!(rs.row_count(), count);
        let names: Vec<_> = rs.columns().iter().map(|c| c.name.clone()).collect();
        prop_assert_eq!(names, vec!["Id", "Name", "Name"]);
        prop_assert_eq!(<(Widget, Owner, Gadget)>::columns().len(), 2 + 1 + 3);
    }
}
