use mockdb_core::{Builder, Connection, ResultSet, Shape};

#[derive(Debug, Clone, PartialEq, Shape)]
pub struct Owner {
    #[shape(max_size = 40)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Shape)]
pub struct Widget {
    pub id: i64,
    #[shape(max_size = 50)]
    pub name: String,
    #[shape(nested)]
    pub owner: Option<Owner>,
}

#[derive(Debug, Clone, PartialEq, Shape)]
#[shape(rename = "Gadgets")]
pub struct Gadget {
    #[shape(rename = "GadgetId")]
    pub id: i32,
    pub weight_kg: f64,
    pub in_stock: bool,
    #[shape(skip)]
    #[allow(dead_code)]
    pub cache: Vec<u8>,
}

pub fn widget(id: i64, name: &str) -> Widget {
    Widget {
        id,
        name: name.to_string(),
        owner: None,
    }
}

pub fn rows_of(count: usize) -> ResultSet {
    ResultSet::from_values("N", 0..count as i64)
}

pub fn connection() -> Connection {
    Builder::new().build()
}
