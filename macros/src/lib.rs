mod shape;

use proc_macro::TokenStream;

/// Derive `mockdb_core::Shape` for a struct with named fields.
///
/// Every field becomes a property, named after the field in PascalCase.
/// Field types must implement `ShapeValue` unless marked `nested`.
///
/// Field attributes:
///
/// - `#[shape(rename = "Name")]`: property name to use instead.
/// - `#[shape(skip)]`: not a property.
/// - `#[shape(nested)]`: the field is itself a shape (or an `Option` of
///   one), reachable with dotted property paths.
/// - `#[shape(max_size = 50)]`: column size reported in result set metadata.
///
/// The struct itself accepts `#[shape(rename = "...")]`.
///
/// ```ignore
/// #[derive(Shape)]
/// struct Widget {
///     id: i64,
///     #[shape(max_size = 50)]
///     name: String,
///     #[shape(nested)]
///     owner: Option<Owner>,
///     #[shape(skip)]
///     cache: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Shape, attributes(shape))]
pub fn derive_shape(input: TokenStream) -> TokenStream {
    shape::derive_shape_inner(input)
}
