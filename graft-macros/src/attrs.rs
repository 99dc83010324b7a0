//! `#[graft(...)]` attribute parsing shared by the entity derives.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, LitStr, Token, Type};

/// Struct-level attributes.
#[derive(Default)]
pub struct StructAttrs {
    pub labels: Vec<String>,
    pub rel_type: Option<String>,
}

impl StructAttrs {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = StructAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("graft")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("label") {
                    let s: LitStr = meta.value()?.parse()?;
                    out.labels.push(s.value());
                } else if meta.path.is_ident("type") {
                    let s: LitStr = meta.value()?.parse()?;
                    out.rel_type = Some(s.value());
                } else {
                    return Err(meta.error("unknown graft attribute"));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

/// What a field is for.
pub enum FieldRole {
    Identity,
    Property { property: String, primary: bool },
    Labels,
    Relationship { rel_type: Option<String>, direction: TokenStream },
    Start,
    End,
    Skip,
}

pub struct EntityField<'a> {
    pub ident: &'a Ident,
    pub ty: &'a Type,
    pub name: String,
    pub role: FieldRole,
}

pub fn parse_field(field: &Field) -> syn::Result<EntityField<'_>> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "graft entities need named fields"))?;
    let name = ident.to_string();

    let mut id = false;
    let mut skip = false;
    let mut labels = false;
    let mut start = false;
    let mut end = false;
    let mut primary = false;
    let mut prop = None;
    let mut rel: Option<Option<String>> = None;
    let mut direction = None;

    for attr in field.attrs.iter().filter(|a| a.path().is_ident("graft")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                id = true;
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else if meta.path.is_ident("labels") {
                labels = true;
            } else if meta.path.is_ident("start") {
                start = true;
            } else if meta.path.is_ident("end") {
                end = true;
            } else if meta.path.is_ident("primary") {
                primary = true;
            } else if meta.path.is_ident("prop") {
                let s: LitStr = meta.value()?.parse()?;
                prop = Some(s.value());
            } else if meta.path.is_ident("rel") {
                if meta.input.peek(Token![=]) {
                    let s: LitStr = meta.value()?.parse()?;
                    rel = Some(Some(s.value()));
                } else {
                    rel = Some(None);
                }
            } else if meta.path.is_ident("direction") {
                let s: LitStr = meta.value()?.parse()?;
                direction = Some(direction_tokens(&s)?);
            } else {
                return Err(meta.error("unknown graft attribute"));
            }
            Ok(())
        })?;
    }

    let chosen = [id, skip, labels, start, end, rel.is_some()]
        .iter()
        .filter(|b| **b)
        .count();
    if chosen > 1 {
        return Err(syn::Error::new_spanned(
            field,
            "a field can only be one of id, skip, labels, start, end or rel",
        ));
    }
    if direction.is_some() && rel.is_none() {
        return Err(syn::Error::new_spanned(field, "direction is only valid on rel fields"));
    }

    let role = if id {
        FieldRole::Identity
    } else if skip {
        FieldRole::Skip
    } else if labels {
        FieldRole::Labels
    } else if start {
        FieldRole::Start
    } else if end {
        FieldRole::End
    } else if let Some(rel_type) = rel {
        FieldRole::Relationship {
            rel_type,
            direction: direction.unwrap_or_else(|| quote!(Outgoing)),
        }
    } else {
        FieldRole::Property { property: prop.unwrap_or_else(|| name.clone()), primary }
    };

    Ok(EntityField { ident, ty: &field.ty, name, role })
}

fn direction_tokens(s: &LitStr) -> syn::Result<TokenStream> {
    match s.value().to_ascii_uppercase().as_str() {
        "OUTGOING" => Ok(quote!(Outgoing)),
        "INCOMING" => Ok(quote!(Incoming)),
        "UNDIRECTED" => Ok(quote!(Undirected)),
        other => Err(syn::Error::new(
            s.span(),
            format!("invalid direction \"{other}\", expected OUTGOING, INCOMING or UNDIRECTED"),
        )),
    }
}

/// The named fields of a struct, or an error naming the derive.
pub fn named_fields<'a>(ast: &'a DeriveInput, derive: &str) -> syn::Result<Vec<&'a Field>> {
    match &ast.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => Ok(named.named.iter().collect()),
            _ => Err(syn::Error::new_spanned(
                ast,
                format!("{derive} only supports structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(ast, format!("{derive} only supports structs"))),
    }
}

/// Syntactic `Option<...>` check.
pub fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(p) => p.path.segments.last().is_some_and(|s| s.ident == "Option"),
        _ => false,
    }
}

/// Generated code shared by node and relationship entities: the identity
/// accessors and property reads.
pub fn entity_common(fields: &[EntityField<'_>], span_source: &DeriveInput) -> syn::Result<TokenStream> {
    let ids: Vec<_> = fields
        .iter()
        .filter(|f| matches!(f.role, FieldRole::Identity))
        .collect();
    let id = match ids.as_slice() {
        [id] => id.ident,
        [] => {
            return Err(syn::Error::new_spanned(
                span_source,
                "graft entities need a #[graft(id)] field of type Option<i64>",
            ))
        }
        _ => return Err(syn::Error::new(Span::call_site(), "only one #[graft(id)] field is allowed")),
    };

    let arms = fields.iter().filter_map(|f| match &f.role {
        FieldRole::Property { .. } => {
            let name = &f.name;
            let ident = f.ident;
            Some(if is_option(f.ty) {
                quote! {
                    #name => self.#ident.clone().map(graft_core::traits::IntoGraphValue::into_value)
                }
            } else {
                quote! {
                    #name => Some(graft_core::traits::IntoGraphValue::into_value(self.#ident.clone()))
                }
            })
        }
        _ => None,
    });

    Ok(quote! {
        fn native_id(&self) -> Option<i64> {
            self.#id
        }

        fn set_native_id(&mut self, id: Option<i64>) {
            self.#id = id;
        }

        fn property(&self, field: &str) -> Option<neo4rs::BoltType> {
            match field {
                #(#arms,)*
                _ => None,
            }
        }
    })
}

/// `.identity(..)` and `.property(..)` calls for the generated descriptor.
pub fn descriptor_common(fields: &[EntityField<'_>]) -> TokenStream {
    let calls = fields.iter().filter_map(|f| match &f.role {
        FieldRole::Identity => {
            let name = &f.name;
            Some(quote!(.identity(#name)))
        }
        FieldRole::Property { property, primary } => {
            let name = &f.name;
            let primary = primary.then(|| quote!(.primary_index(#name)));
            Some(quote!(.property(#name, #property) #primary))
        }
        _ => None,
    });
    quote!(#(#calls)*)
}
