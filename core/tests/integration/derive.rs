use mockdb_core::{shape::PropertyKind, Error, ResultSet, Shape, Value, ValueType};

use crate::common::{widget, Gadget, Owner, Widget};

#[test]
fn test_derived_descriptor() {
    let descriptors = Widget::describe();
    let names: Vec<_> = descriptors.iter().map(|d| d.name).collect();
    assert_eq!(names, ["Id", "Name", "Owner"]);
    assert!(matches!(descriptors[0].kind, PropertyKind::Scalar(ValueType::Integer)));
    assert_eq!(descriptors[1].max_size, Some(50));
    assert!(matches!(
        descriptors[2].kind,
        PropertyKind::Nested { shape: "Owner", .. }
    ));
    assert_eq!(Widget::shape_name(), "Widget");
}

#[test]
fn test_rename_and_skip() {
    assert_eq!(Gadget::shape_name(), "Gadgets");
    let names: Vec<_> = Gadget::describe().iter().map(|d| d.name).collect();
    assert_eq!(names, ["GadgetId", "WeightKg", "InStock"]);

    let rs = ResultSet::from_shapes(&[Gadget {
        id: 7,
        weight_kg: 1.5,
        in_stock: true,
        cache: vec![1, 2],
    }])
    .unwrap();
    assert_eq!(rs.rows()[0], vec![Value::Integer(7), Value::Real(1.5), Value::Boolean(true)]);
    assert_eq!(rs.columns()[2].value_type, ValueType::Boolean);
}

#[test]
fn test_dotted_paths_through_derived_shapes() {
    let mut owned = widget(1, "a");
    owned.owner = Some(Owner {
        name: "ann".to_string(),
    });
    let rs = ResultSet::from_objects(&[owned, widget(2, "b")], &["Id", "Owner.Name"]).unwrap();
    assert_eq!(rs.columns()[1].name, "Name");
    assert_eq!(rs.columns()[1].max_size, Some(40));
    assert_eq!(rs.cell(0, 1), Some(&Value::from("ann")));
    assert_eq!(rs.cell(1, 1), Some(&Value::Null));
}

#[test]
fn test_unknown_path_fails_before_rows() {
    let err = ResultSet::from_objects::<Widget, _>(&[], &["Owner.Email"]).unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownProperty { ref shape, ref path } if shape == "Widget" && path == "Owner.Email"
    ));
}
