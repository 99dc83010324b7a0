use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{descriptor_common, entity_common, named_fields, parse_field, EntityField, FieldRole, StructAttrs};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_node(&ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_node(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let type_name = name.to_string();
    let attrs = StructAttrs::parse(&ast.attrs)?;
    if attrs.rel_type.is_some() {
        return Err(syn::Error::new_spanned(
            ast,
            "`type` belongs on relationship entities; use #[derive(RelationshipEntity)]",
        ));
    }
    let labels = if attrs.labels.is_empty() { vec![type_name.clone()] } else { attrs.labels };

    let fields = named_fields(ast, "NodeEntity")?
        .into_iter()
        .map(parse_field)
        .collect::<syn::Result<Vec<EntityField<'_>>>>()?;

    if let Some(f) = fields.iter().find(|f| matches!(f.role, FieldRole::Start | FieldRole::End)) {
        return Err(syn::Error::new_spanned(
            f.ident,
            "start/end fields belong on relationship entities",
        ));
    }

    let common = entity_common(&fields, ast)?;
    let descriptor = descriptor_common(&fields);

    let related_arms = fields.iter().filter_map(|f| match f.role {
        FieldRole::Relationship { .. } => {
            let field = &f.name;
            let ident = f.ident;
            let ty = f.ty;
            Some(quote! {
                #field => <#ty as graft_core::traits::Relatable>::refs(&self.#ident)
            })
        }
        _ => None,
    });

    let relationship_calls = fields.iter().filter_map(|f| match &f.role {
        FieldRole::Relationship { rel_type, direction } => {
            let field = &f.name;
            let ty = f.ty;
            let rel_type = rel_type.as_ref().map(|t| quote!(.relationship_type(#t)));
            Some(quote! {
                .relationship(
                    graft_core::metadata::RelationshipField::new(
                        #field,
                        <#ty as graft_core::traits::Relatable>::target_type(),
                        <#ty as graft_core::traits::Relatable>::COLLECTION,
                    )
                    #rel_type
                    .direction(graft_core::metadata::Direction::#direction)
                )
            })
        }
        _ => None,
    });

    let label_fields: Vec<_> = fields
        .iter()
        .filter(|f| matches!(f.role, FieldRole::Labels))
        .collect();
    let (labels_fn, label_field_call) = match label_fields.as_slice() {
        [] => (quote!(), quote!()),
        [f] => {
            let ident = f.ident;
            let field = &f.name;
            (
                quote! {
                    fn labels(&self) -> Vec<String> {
                        self.#ident.iter().map(|l| l.to_string()).collect()
                    }
                },
                quote!(.label_field(#field)),
            )
        }
        _ => {
            return Err(syn::Error::new_spanned(ast, "only one #[graft(labels)] field is allowed"));
        }
    };

    Ok(quote! {
        impl graft_core::traits::GraphEntity for #name {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            #common

            fn related(&self, field: &str) -> Vec<graft_core::traits::EntityRef> {
                match field {
                    #(#related_arms,)*
                    _ => Vec::new(),
                }
            }

            #labels_fn
        }

        impl graft_core::traits::EntityType for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn class_info() -> graft_core::metadata::ClassInfo {
                graft_core::metadata::ClassInfo::node(#type_name)
                    #(.label(#labels))*
                    #descriptor
                    #label_field_call
                    #(#relationship_calls)*
            }
        }
    })
}
