//! Shape descriptors: the static description of a row type used to derive
//! result set columns from typed objects.
//!
//! A shape is normally obtained with `#[derive(Shape)]`. The descriptor is
//! static (`describe` takes no instance) so that property paths resolve, and
//! fail, before any row is materialized.

use crate::result_set::ColumnMeta;
use crate::value::{Value, ValueType};
use crate::{Error, Result};

pub trait Shape {
    /// Name of the shape, used in diagnostics.
    fn shape_name() -> &'static str
    where
        Self: Sized;

    /// Properties in declaration order.
    fn describe() -> Vec<PropertyDescriptor>
    where
        Self: Sized;

    /// Read one property by its canonical name.
    fn property(&self, name: &str) -> Option<Property<'_>>;
}

#[derive(Debug, Clone, Copy)]
pub enum PropertyKind {
    Scalar(ValueType),
    Nested {
        shape: &'static str,
        describe: fn() -> Vec<PropertyDescriptor>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub max_size: Option<usize>,
}

impl PropertyDescriptor {
    pub const fn scalar(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            kind: PropertyKind::Scalar(value_type),
            max_size: None,
        }
    }

    pub const fn nested(
        name: &'static str,
        shape: &'static str,
        describe: fn() -> Vec<PropertyDescriptor>,
    ) -> Self {
        Self {
            name,
            kind: PropertyKind::Nested { shape, describe },
            max_size: None,
        }
    }

    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, PropertyKind::Scalar(_))
    }

    fn column(&self) -> Option<ColumnMeta> {
        match self.kind {
            PropertyKind::Scalar(value_type) => Some(ColumnMeta {
                name: self.name.to_string(),
                value_type,
                max_size: self.max_size,
            }),
            PropertyKind::Nested { .. } => None,
        }
    }
}

/// A property value read from a shape instance.
pub enum Property<'a> {
    Value(Value),
    /// A nested shape, `None` when the nested object is absent.
    Nested(Option<&'a dyn Shape>),
}

/// Scalar field types a shape can expose as a column.
pub trait ShapeValue {
    const VALUE_TYPE: ValueType;

    fn to_value(&self) -> Value;
}

macro_rules! impl_shape_value {
    ($value_type:expr => $($t:ty),*) => {
        $(impl ShapeValue for $t {
            const VALUE_TYPE: ValueType = $value_type;

            fn to_value(&self) -> Value {
                Value::from(self.clone())
            }
        })*
    };
}

impl_shape_value!(ValueType::Integer => i8, i16, i32, i64, u8, u16, u32, isize);
impl_shape_value!(ValueType::Real => f32, f64);
impl_shape_value!(ValueType::Boolean => bool);
impl_shape_value!(ValueType::Text => String);
impl_shape_value!(ValueType::Blob => Vec<u8>);

impl ShapeValue for Value {
    const VALUE_TYPE: ValueType = ValueType::Any;

    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ShapeValue> ShapeValue for Option<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE;

    fn to_value(&self) -> Value {
        match self {
            Some(value) => value.to_value(),
            None => Value::Null,
        }
    }
}

/// A dotted property path resolved against a shape descriptor.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    segments: Vec<&'static str>,
    column: ColumnMeta,
}

impl ResolvedPath {
    pub fn column(&self) -> &ColumnMeta {
        &self.column
    }

    pub fn segments(&self) -> &[&'static str] {
        &self.segments
    }

    /// Read the value at this path from one object. An absent nested object
    /// anywhere along the path yields `Null`.
    pub fn value_of(&self, object: &dyn Shape) -> Result<Value> {
        let mut current = object;
        let (last, parents) = match self.segments.split_last() {
            Some(split) => split,
            None => return Ok(Value::Null),
        };
        for segment in parents {
            match current.property(segment) {
                Some(Property::Nested(Some(next))) => current = next,
                Some(Property::Nested(None)) => return Ok(Value::Null),
                _ => return Err(self.unknown()),
            }
        }
        match current.property(last) {
            Some(Property::Value(value)) => Ok(value),
            _ => Err(self.unknown()),
        }
    }

    fn unknown(&self) -> Error {
        Error::UnknownProperty {
            shape: String::new(),
            path: self.segments.join("."),
        }
    }
}

/// Resolve `path` (for example `Owner.Name`) case-insensitively.
pub fn resolve_path(
    shape: &'static str,
    descriptors: &[PropertyDescriptor],
    path: &str,
) -> Result<ResolvedPath> {
    let unknown = || Error::UnknownProperty {
        shape: shape.to_string(),
        path: path.to_string(),
    };
    let mut segments = Vec::new();
    let mut level = descriptors.to_vec();
    let mut parts = path.split('.').map(str::trim).peekable();
    while let Some(part) = parts.next() {
        let descriptor = level
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(part))
            .copied()
            .ok_or_else(unknown)?;
        segments.push(descriptor.name);
        match (descriptor.kind, parts.peek().is_some()) {
            (PropertyKind::Nested { describe, .. }, true) => level = describe(),
            (PropertyKind::Scalar(_), false) => {
                let column = descriptor.column().ok_or_else(unknown)?;
                return Ok(ResolvedPath { segments, column });
            }
            _ => return Err(unknown()),
        }
    }
    Err(unknown())
}

/// Columns for every scalar property, in declaration order.
pub fn scalar_columns(descriptors: &[PropertyDescriptor]) -> Vec<ColumnMeta> {
    descriptors
        .iter()
        .filter_map(PropertyDescriptor::column)
        .collect()
}

/// Append the value of every scalar property of `object` to `row`.
pub fn push_scalar_values(
    object: &dyn Shape,
    descriptors: &[PropertyDescriptor],
    row: &mut Vec<Value>,
) -> Result<()> {
    for descriptor in descriptors.iter().filter(|d| d.is_scalar()) {
        match object.property(descriptor.name) {
            Some(Property::Value(value)) => row.push(value),
            _ => {
                return Err(Error::UnknownProperty {
                    shape: String::new(),
                    path: descriptor.name.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Row types made of 2 to 4 shapes, flattened slot by slot.
pub trait TupleShape {
    fn columns() -> Vec<ColumnMeta>;

    fn flatten(&self, row: &mut Vec<Value>) -> Result<()>;
}

macro_rules! impl_tuple_shape {
    ($($name:ident . $idx:tt),+) => {
        impl<$($name: Shape),+> TupleShape for ($($name,)+) {
            fn columns() -> Vec<ColumnMeta> {
                let mut columns = Vec::new();
                $(columns.extend(scalar_columns(&$name::describe()));)+
                columns
            }

            fn flatten(&self, row: &mut Vec<Value>) -> Result<()> {
                $(push_scalar_values(&self.$idx, &$name::describe(), row)?;)+
                Ok(())
            }
        }
    };
}

impl_tuple_shape!(A.0, B.1);
impl_tuple_shape!(A.0, B.1, C.2);
impl_tuple_shape!(A.0, B.1, C.2, D.3);
