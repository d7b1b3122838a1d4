//! mapd derive: procedural macros for the mapd client.
//!
//! Provides `#[derive(Row)]`, mapping a struct with named fields onto a
//! table row for typed loads and fetches.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derive `IntoRow` and `FromRow` for a struct.
///
/// # Example
///
/// ```ignore
/// #[derive(Row)]
/// #[mapd(table_name = "stocks")]
/// pub struct Stock {
///     pub symbol: String,
///     #[mapd(rename = "trans_date")]
///     pub date: chrono::NaiveDate,
///     pub qty: Option<i32>,
/// }
/// ```
///
/// Generates:
/// - `TABLE_NAME` constant (defaults to the lowercased struct name)
/// - `IntoRow`: row descriptor from the field types, values in field order
/// - `FromRow`: fields looked up by column name
#[proc_macro_derive(Row, attributes(mapd))]
pub fn derive_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let table_name = extract_table_name(input)?.unwrap_or_else(|| name.to_string().to_lowercase());

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Row can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(name, "Row can only be derived for structs"));
        }
    };

    let mut idents = Vec::with_capacity(fields.len());
    let mut columns = Vec::with_capacity(fields.len());
    let mut types = Vec::with_capacity(fields.len());
    for f in fields {
        let ident = f
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(f, "unnamed field"))?;
        columns.push(extract_rename(f)?.unwrap_or_else(|| ident.to_string()));
        idents.push(ident);
        types.push(&f.ty);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            pub const TABLE_NAME: &'static str = #table_name;
        }

        impl #impl_generics ::mapd_core::api::IntoRow for #name #ty_generics #where_clause {
            fn table_name() -> ::core::option::Option<&'static str> {
                ::core::option::Option::Some(#table_name)
            }

            fn row_desc() -> ::std::vec::Vec<::mapd_core::types::ColumnDesc> {
                ::std::vec![
                    #(::mapd_core::types::ColumnDesc::new(
                        #columns,
                        <#types as ::mapd_core::api::IntoColumnType>::column_type(),
                    )),*
                ]
            }

            fn into_row(self) -> ::std::vec::Vec<::mapd_core::marshal::Value> {
                ::std::vec![
                    #(::mapd_core::api::IntoValue::into_value(self.#idents)),*
                ]
            }
        }

        impl #impl_generics ::mapd_core::api::FromRow for #name #ty_generics #where_clause {
            fn from_row(
                names: &[::std::string::String],
                mut row: ::std::vec::Vec<::mapd_core::marshal::Value>,
            ) -> ::mapd_core::error::MapdResult<Self> {
                ::core::result::Result::Ok(Self {
                    #(#idents: ::mapd_core::api::take_column(names, &mut row, #columns)?),*
                })
            }
        }
    })
}

fn extract_table_name(input: &DeriveInput) -> syn::Result<Option<String>> {
    for attr in &input.attrs {
        if attr.path().is_ident("mapd")
            && let syn::Meta::NameValue(nv) = attr.parse_args::<syn::Meta>()?
            && nv.path.is_ident("table_name")
            && let syn::Expr::Lit(lit) = nv.value
            && let syn::Lit::Str(s) = lit.lit
        {
            return Ok(Some(s.value()));
        }
    }
    Ok(None)
}

fn extract_rename(field: &syn::Field) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("mapd")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let s: syn::LitStr = meta.value()?.parse()?;
                rename = Some(s.value());
                Ok(())
            } else {
                Err(meta.error("unsupported mapd field attribute, expected `rename`"))
            }
        })?;
    }
    Ok(rename)
}
