use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{is_option, named_fields};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let name = &ast.ident;

    let fields = match named_fields(&ast, "FromRow") {
        Ok(fields) => fields,
        Err(err) => return err.to_compile_error().into(),
    };

    let struct_name = name.to_string();
    let mut inits = Vec::new();

    for f in fields {
        let Some(ident) = f.ident.as_ref() else {
            continue;
        };
        let key = ident.to_string();
        let ty = &f.ty;

        // Missing column on an Option<...> field reads as None.
        if is_option(ty) {
            inits.push(quote! {
                #ident: match graft_core::record::get_value(record, #key) {
                    None => None,
                    Some(v) => <#ty as graft_core::traits::FromGraphValue>::from_value(v)
                        .map_err(|e| e.with_context(format!("{}::{}", #struct_name, #key)))?,
                }
            });
        } else {
            inits.push(quote! {
                #ident: {
                    let v = graft_core::record::get_value(record, #key)
                        .ok_or_else(|| graft_core::error::GraftError::missing_field(#key, #struct_name))?;
                    <#ty as graft_core::traits::FromGraphValue>::from_value(v)
                        .map_err(|e| e.with_context(format!("{}::{}", #struct_name, #key)))?
                }
            });
        }
    }

    let expanded = quote! {
        impl graft_core::traits::FromRow for #name {
            fn from_record(record: &neo4rs::Row) -> Result<Self, graft_core::error::GraftError> {
                Ok(Self {
                    #(#inits,)*
                })
            }
        }
    };

    expanded.into()
}
