use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, GenericArgument, LitInt, LitStr, PathArguments, Type};

struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
    nested: bool,
    max_size: Option<usize>,
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs {
        rename: None,
        skip: false,
        nested: false,
        max_size: None,
    };
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("shape")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                attrs.rename = Some(name.value());
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else if meta.path.is_ident("nested") {
                attrs.nested = true;
            } else if meta.path.is_ident("max_size") {
                let size: LitInt = meta.value()?.parse()?;
                attrs.max_size = Some(size.base10_parse()?);
            } else {
                return Err(meta.error("expected `rename`, `skip`, `nested` or `max_size`"));
            }
            Ok(())
        })?;
    }
    if attrs.nested && attrs.max_size.is_some() {
        return Err(syn::Error::new_spanned(
            field,
            "`max_size` only applies to scalar properties",
        ));
    }
    Ok(attrs)
}

fn container_name(input: &DeriveInput) -> syn::Result<String> {
    let mut name = input.ident.to_string();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("shape")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                name = value.value();
                Ok(())
            } else {
                Err(meta.error("expected `rename`"))
            }
        })?;
    }
    Ok(name)
}

/// `owner_name` becomes `OwnerName`.
fn pascal_case(ident: &str) -> String {
    ident
        .trim_start_matches("r#")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// The `T` of an `Option<T>` field.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match &args.args[0] {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn derive_shape_inner(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Shape can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Shape can only be derived for structs",
            ))
        }
    };
    let shape_name = container_name(input)?;

    let mut descriptors = Vec::new();
    let mut arms = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        let property = attrs
            .rename
            .clone()
            .unwrap_or_else(|| pascal_case(&ident.to_string()));
        let ty = &field.ty;

        if attrs.nested {
            let (inner, value) = match option_inner(ty) {
                Some(inner) => (
                    inner,
                    quote! {
                        self.#ident.as_ref().map(|v| v as &dyn ::mockdb_core::shape::Shape)
                    },
                ),
                None => (
                    ty,
                    quote! { Some(&self.#ident as &dyn ::mockdb_core::shape::Shape) },
                ),
            };
            descriptors.push(quote! {
                ::mockdb_core::shape::PropertyDescriptor::nested(
                    #property,
                    <#inner as ::mockdb_core::shape::Shape>::shape_name(),
                    <#inner as ::mockdb_core::shape::Shape>::describe,
                )
            });
            arms.push(quote! {
                #property => Some(::mockdb_core::shape::Property::Nested(#value)),
            });
        } else {
            let max_size = attrs.max_size.map(|size| quote! { .with_max_size(#size) });
            descriptors.push(quote! {
                ::mockdb_core::shape::PropertyDescriptor::scalar(
                    #property,
                    <#ty as ::mockdb_core::shape::ShapeValue>::VALUE_TYPE,
                )
                #max_size
            });
            arms.push(quote! {
                #property => Some(::mockdb_core::shape::Property::Value(
                    ::mockdb_core::shape::ShapeValue::to_value(&self.#ident),
                )),
            });
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::mockdb_core::shape::Shape for #name #ty_generics #where_clause {
            fn shape_name() -> &'static str {
                #shape_name
            }

            fn describe() -> ::std::vec::Vec<::mockdb_core::shape::PropertyDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            fn property(&self, name: &str) -> ::std::option::Option<::mockdb_core::shape::Property<'_>> {
                match name {
                    #(#arms)*
                    _ => None,
                }
            }
        }
    })
}
