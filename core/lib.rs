//! # mockdb
//!
//! mockdb is an in-memory stand-in for a synchronous database client, built
//! for unit tests. Test setup queues responders on a [`Connection`]; the code
//! under test executes commands against it as it would against a real
//! database; the test then asserts on the recorded invocations.
//!
//! ## Getting Started
//!
//! ```rust
//! use mockdb_core::{named_params, Builder, ResultSet, Value};
//!
//! let conn = Builder::new().build();
//! conn.setup_for_non_query(1);
//! conn.setup_for_query(
//!     ResultSet::with_column_names(&["Id", "Name"], vec![vec![1.into(), "foo".into()]]).unwrap(),
//! );
//!
//! conn.execute(
//!     "INSERT INTO Widgets (Id, Name) VALUES (@Id, @Name)",
//!     named_params! { "@Id": 1, "@Name": "foo" },
//! )
//! .unwrap();
//! let mut reader = conn.query("SELECT Id, Name FROM Widgets", ()).unwrap();
//! assert!(reader.read().unwrap());
//! assert_eq!(reader.get_value(1).unwrap(), Value::from("foo"));
//!
//! conn.ledger()
//!     .should_have_inserted("Widgets", &["Id", "Name"])
//!     .unwrap();
//! ```
//!
//! Result sets can also be derived from typed rows with `#[derive(Shape)]`:
//!
//! ```rust
//! use mockdb_core::{Builder, Shape};
//!
//! #[derive(Shape)]
//! struct Widget {
//!     id: i64,
//!     #[shape(max_size = 50)]
//!     name: String,
//! }
//!
//! let conn = Builder::new().build();
//! conn.setup_for_objects(&[Widget { id: 1, name: "x".into() }]).unwrap();
//! let mut reader = conn.query("SELECT * FROM Widgets", ()).unwrap();
//! assert_eq!(reader.column_name(1).unwrap(), "Name");
//! assert!(reader.read().unwrap());
//! ```

extern crate self as mockdb_core;

mod command;
pub mod connection;
pub mod error;
pub mod parameters;
pub mod params;
mod reader;
pub mod result_set;
pub mod shape;
pub mod transaction;
pub mod value;
pub mod verify;

pub use command::{Command, CommandKind, ExecuteMethod, Invocation, Responder, Response};
pub use connection::{Builder, Connection, ConnectionOpts, ConnectionState, ExhaustedPolicy};
pub use error::{AssertionFailure, Error, Result};
pub use parameters::{Direction, Parameter, Parameters};
pub use params::{params_from_iter, IntoParams, Params};
pub use reader::DataReader;
pub use result_set::{ColumnMeta, ResultSet};
pub use shape::{Property, PropertyDescriptor, PropertyKind, Shape, ShapeValue, TupleShape};
pub use transaction::{DropBehavior, Transaction, TransactionRecord, TransactionState};
pub use value::{FromValue, Value, ValueType};
pub use verify::{Ledger, StatementPattern};

#[cfg(feature = "macros")]
pub use mockdb_macros::Shape;
