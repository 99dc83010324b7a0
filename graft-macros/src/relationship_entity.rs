use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{descriptor_common, entity_common, named_fields, parse_field, EntityField, FieldRole, StructAttrs};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_relationship(&ast) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_relationship(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let type_name = name.to_string();
    let attrs = StructAttrs::parse(&ast.attrs)?;
    if !attrs.labels.is_empty() {
        return Err(syn::Error::new_spanned(ast, "relationship entities have a type, not labels"));
    }
    let rel_type = attrs.rel_type.unwrap_or_else(|| type_name.clone());

    let fields = named_fields(ast, "RelationshipEntity")?
        .into_iter()
        .map(parse_field)
        .collect::<syn::Result<Vec<EntityField<'_>>>>()?;

    if let Some(f) = fields
        .iter()
        .find(|f| matches!(f.role, FieldRole::Relationship { .. } | FieldRole::Labels))
    {
        return Err(syn::Error::new_spanned(
            f.ident,
            "relationship entities cannot declare rel or labels fields",
        ));
    }

    let start = endpoint(&fields, ast, "start", |r| matches!(r, FieldRole::Start))?;
    let end = endpoint(&fields, ast, "end", |r| matches!(r, FieldRole::End))?;

    let common = entity_common(&fields, ast)?;
    let descriptor = descriptor_common(&fields);

    let (start_ident, start_ty, start_name) = (start.ident, start.ty, &start.name);
    let (end_ident, end_ty, end_name) = (end.ident, end.ty, &end.name);

    Ok(quote! {
        impl graft_core::traits::GraphEntity for #name {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            #common

            fn start_node(&self) -> Option<graft_core::traits::EntityRef> {
                <#start_ty as graft_core::traits::Relatable>::refs(&self.#start_ident).into_iter().next()
            }

            fn end_node(&self) -> Option<graft_core::traits::EntityRef> {
                <#end_ty as graft_core::traits::Relatable>::refs(&self.#end_ident).into_iter().next()
            }
        }

        impl graft_core::traits::EntityType for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn class_info() -> graft_core::metadata::ClassInfo {
                graft_core::metadata::ClassInfo::relationship_entity(#type_name, #rel_type)
                    #descriptor
                    .start(#start_name, <#start_ty as graft_core::traits::Relatable>::target_type())
                    .end(#end_name, <#end_ty as graft_core::traits::Relatable>::target_type())
            }
        }
    })
}

fn endpoint<'f, 'a>(
    fields: &'f [EntityField<'a>],
    ast: &DeriveInput,
    what: &str,
    role: fn(&FieldRole) -> bool,
) -> syn::Result<&'f EntityField<'a>> {
    let found: Vec<_> = fields.iter().filter(|f| role(&f.role)).collect();
    match found.as_slice() {
        [f] => Ok(*f),
        [] => Err(syn::Error::new_spanned(ast, format!("missing #[graft({what})] field"))),
        _ => Err(syn::Error::new_spanned(ast, format!("only one #[graft({what})] field is allowed"))),
    }
}
