//! `#[derive(Reflect)]`: generates `Shape`, `RecordPeek`/`Encode`, and
//! `Decode` impls for structs and enums from `wireshape-core`.
//!
//! Field- and variant-level behavior is driven by `#[wireshape(...)]`
//! attributes: `rename = "..."`, `alias = "..."` (repeatable), `skip`,
//! `hidden`.
//!
//! Enums additionally read two enum-level attributes that choose how a
//! variant is told apart on read, in order of preference if more than one
//! applied: `#[wireshape(tag = "key")]` for internal tagging (a flat object
//! with the variant name under `key` alongside the payload's own fields),
//! `#[wireshape(untagged)]` for structural discrimination (the variant
//! whose payload's field set matches the decoded object's keys, first
//! declaration wins). With neither, a variant is external-tagged: the
//! whole value is wrapped `{"VariantName": payload}` (or, for BEVE's
//! native variant extension, keyed by the variant's declaration index
//! instead of its name).

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitStr};

#[proc_macro_derive(Reflect, attributes(wireshape))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = match &input.data {
        Data::Struct(data) => derive_struct(&input, data),
        Data::Enum(data) => derive_enum(&input, data),
        Data::Union(_) => {
            syn::Error::new_spanned(&input, "#[derive(Reflect)] does not support unions")
                .to_compile_error()
        }
    };
    expanded.into()
}

struct FieldAttrs {
    rename: Option<String>,
    aliases: Vec<String>,
    skip: bool,
    hidden: bool,
    /// Enum-level only: the discriminator key for internal tagging, e.g.
    /// `#[wireshape(tag = "type")]`.
    tag: Option<String>,
    /// Enum-level only: `#[wireshape(untagged)]` selects a variant by
    /// matching the decoded object's field set against each variant
    /// payload's shape, instead of reading an explicit discriminator.
    untagged: bool,
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> FieldAttrs {
    let mut out = FieldAttrs {
        rename: None,
        aliases: Vec::new(),
        skip: false,
        hidden: false,
        tag: None,
        untagged: false,
    };
    for attr in attrs {
        if !attr.path().is_ident("wireshape") {
            continue;
        }
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                out.rename = Some(lit.value());
            } else if meta.path.is_ident("alias") {
                let lit: LitStr = meta.value()?.parse()?;
                out.aliases.push(lit.value());
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("hidden") {
                out.hidden = true;
            } else if meta.path.is_ident("tag") {
                let lit: LitStr = meta.value()?.parse()?;
                out.tag = Some(lit.value());
            } else if meta.path.is_ident("untagged") {
                out.untagged = true;
            }
            Ok(())
        });
    }
    out
}

fn field_ident_and_name(field: &syn::Field, index: usize) -> (Ident, String) {
    match &field.ident {
        Some(ident) => (ident.clone(), ident.to_string()),
        None => (format_ident!("f{}", index), index.to_string()),
    }
}

fn derive_struct(input: &DeriveInput, data: &syn::DataStruct) -> TokenStream2 {
    let name = &input.ident;
    let fields = match &data.fields {
        Fields::Named(f) => f.named.iter().collect::<Vec<_>>(),
        Fields::Unnamed(_) | Fields::Unit => {
            return syn::Error::new_spanned(
                &data.fields,
                "#[derive(Reflect)] only supports structs with named fields",
            )
            .to_compile_error();
        }
    };

    let mut field_info_entries = Vec::new();
    let mut field_peek_arms = Vec::new();
    let mut decode_arms = Vec::new();

    for (i, field) in fields.iter().enumerate() {
        let attrs = parse_field_attrs(&field.attrs);
        let (ident, default_name) = field_ident_and_name(field, i);
        let wire_name = attrs.rename.unwrap_or(default_name);
        let aliases = &attrs.aliases;
        let skip = attrs.skip;
        let hidden = attrs.hidden;

        field_info_entries.push(quote! {
            wireshape_core::FieldInfo {
                name: #wire_name,
                aliases: &[#(#aliases),*],
                flags: {
                    #[allow(unused_mut)]
                    let mut flags = wireshape_core::FieldFlags::empty();
                    if #skip { flags = flags.union(wireshape_core::FieldFlags::SKIP); }
                    if #hidden { flags = flags.union(wireshape_core::FieldFlags::HIDDEN); }
                    flags
                },
            }
        });

        field_peek_arms.push(quote! {
            #i => wireshape_core::Encode::peek(&self.#ident),
        });

        decode_arms.push(quote! {
            #i => out.#ident = wireshape_core::Decode::decode(src, opts, ctx)?,
        });
    }

    let fields_static = format_ident!("__{}_WIRESHAPE_FIELDS", name);
    let shape_static = format_ident!("__{}_WIRESHAPE_SHAPE", name);
    let type_name_str = name.to_string();

    quote! {
        #[doc(hidden)]
        static #fields_static: &[wireshape_core::FieldInfo] = &[
            #(#field_info_entries),*
        ];

        #[doc(hidden)]
        static #shape_static: wireshape_core::Shape =
            wireshape_core::Shape::new(#type_name_str, #fields_static);

        impl wireshape_core::RecordPeek for #name {
            fn shape(&self) -> &'static wireshape_core::Shape {
                &#shape_static
            }

            fn field_peek(&self, index: usize) -> wireshape_core::Peek<'_> {
                match index {
                    #(#field_peek_arms)*
                    _ => unreachable!("field index out of range for {}", #type_name_str),
                }
            }
        }

        impl wireshape_core::Encode for #name {
            fn peek(&self) -> wireshape_core::Peek<'_> {
                wireshape_core::Peek::Record(self)
            }
        }

        impl wireshape_core::Decode for #name
        where
            #name: Default,
        {
            fn decode<S: wireshape_core::EventSource>(
                src: &mut S,
                opts: &wireshape_core::ReadOptions,
                ctx: &mut wireshape_core::Context,
            ) -> Result<Self, wireshape_core::Error> {
                wireshape_core::decode_record(src, opts, ctx, &#shape_static, |out: &mut Self, idx, src, opts, ctx| {
                    match idx {
                        #(#decode_arms)*
                        _ => {}
                    }
                    Ok(())
                })
            }
        }
    }
}

/// One parsed variant, common to all three enum decode strategies below.
struct VariantInfo {
    index: usize,
    ident: Ident,
    tag: String,
    /// `Some(payload type)` for a single-field tuple variant, `None` for a
    /// unit variant.
    payload_ty: Option<syn::Type>,
}

fn derive_enum(input: &DeriveInput, data: &syn::DataEnum) -> TokenStream2 {
    let name = &input.ident;
    let enum_attrs = parse_field_attrs(&input.attrs);

    let mut variants = Vec::new();
    for (index, variant) in data.variants.iter().enumerate() {
        let attrs = parse_field_attrs(&variant.attrs);
        let vident = variant.ident.clone();
        let tag = attrs.rename.unwrap_or_else(|| vident.to_string());

        let payload_ty = match &variant.fields {
            Fields::Unit => None,
            Fields::Unnamed(f) if f.unnamed.len() == 1 => Some(f.unnamed[0].ty.clone()),
            _ => {
                return syn::Error::new_spanned(
                    variant,
                    "#[derive(Reflect)] only supports unit and single-field tuple variants",
                )
                .to_compile_error();
            }
        };

        variants.push(VariantInfo {
            index,
            ident: vident,
            tag,
            payload_ty,
        });
    }

    // `untagged` has no discriminator to write, so its encode side must
    // match its decode side: emit the payload's own shape directly instead
    // of wrapping it in a `Variant`, or a round trip through this crate's
    // own writer could never be read back (`match_variant_by_shapes` looks
    // at the object's own field names, not a wrapper key). `tag` mode still
    // wraps for now — see DESIGN.md for why that one direction is accepted
    // as a known asymmetry.
    let peek_arms: Vec<TokenStream2> = if enum_attrs.untagged {
        variants
            .iter()
            .map(|v| {
                let VariantInfo { ident, .. } = v;
                match &v.payload_ty {
                    None => quote! {
                        #name::#ident => wireshape_core::Peek::Null,
                    },
                    Some(_) => quote! {
                        #name::#ident(value) => wireshape_core::Encode::peek(value),
                    },
                }
            })
            .collect()
    } else {
        variants
            .iter()
            .map(|v| {
                let VariantInfo {
                    index, ident, tag, ..
                } = v;
                match &v.payload_ty {
                    None => quote! {
                        #name::#ident => wireshape_core::Peek::Variant {
                            tag: #tag,
                            index: #index,
                            payload: Box::new(wireshape_core::Peek::Null),
                        },
                    },
                    Some(_) => quote! {
                        #name::#ident(value) => wireshape_core::Peek::Variant {
                            tag: #tag,
                            index: #index,
                            payload: Box::new(wireshape_core::Encode::peek(value)),
                        },
                    },
                }
            })
            .collect()
    };

    let encode_impl = quote! {
        impl wireshape_core::Encode for #name {
            fn peek(&self) -> wireshape_core::Peek<'_> {
                match self {
                    #(#peek_arms)*
                }
            }
        }
    };

    let decode_impl = if let Some(tag_key) = &enum_attrs.tag {
        derive_enum_decode_tagged(name, &variants, tag_key)
    } else if enum_attrs.untagged {
        derive_enum_decode_untagged(name, &variants)
    } else {
        derive_enum_decode_external(name, &variants)
    };

    quote! {
        #encode_impl
        #decode_impl
    }
}

/// Default mode: `{"VariantName": payload}` (self-describing formats) or,
/// for BEVE's native variant extension, a `MapStart`/`MapKeyInt`/payload/
/// `MapEnd` span. One derived `Decode` accepts either key form.
fn derive_enum_decode_external(name: &Ident, variants: &[VariantInfo]) -> TokenStream2 {
    let decode_tag_arms: Vec<TokenStream2> = variants
        .iter()
        .map(|v| {
            let VariantInfo { ident, tag, .. } = v;
            match &v.payload_ty {
                None => quote! {
                    #tag => {
                        src.skip_value()?;
                        Ok(#name::#ident)
                    }
                },
                Some(_) => quote! {
                    #tag => Ok(#name::#ident(wireshape_core::Decode::decode(src, opts, ctx)?)),
                },
            }
        })
        .collect();

    let decode_index_arms: Vec<TokenStream2> = variants
        .iter()
        .map(|v| {
            let VariantInfo { index, ident, .. } = v;
            match &v.payload_ty {
                None => quote! {
                    #index => {
                        src.skip_value()?;
                        Ok(#name::#ident)
                    }
                },
                Some(_) => quote! {
                    #index => Ok(#name::#ident(wireshape_core::Decode::decode(src, opts, ctx)?)),
                },
            }
        })
        .collect();

    quote! {
        impl wireshape_core::Decode for #name {
            fn decode<S: wireshape_core::EventSource>(
                src: &mut S,
                opts: &wireshape_core::ReadOptions,
                ctx: &mut wireshape_core::Context,
            ) -> Result<Self, wireshape_core::Error> {
                match src.next_event()? {
                    wireshape_core::Event::MapStart => {
                        let result = match src.next_event()? {
                            wireshape_core::Event::MapKey(k) => match k.as_str() {
                                #(#decode_tag_arms)*
                                _ => Err(src.error_here(wireshape_core::ErrorKind::UnknownKey)),
                            },
                            wireshape_core::Event::MapKeyInt(i) => match i as usize {
                                #(#decode_index_arms)*
                                _ => Err(src.error_here(wireshape_core::ErrorKind::UnknownKey)),
                            },
                            _ => Err(src.error_here(wireshape_core::ErrorKind::InvalidPartialKey)),
                        }?;
                        match src.next_event()? {
                            wireshape_core::Event::MapEnd => Ok(result),
                            _ => Err(src.error_here(wireshape_core::ErrorKind::SyntaxError)),
                        }
                    }
                    _ => Err(src.error_here(wireshape_core::ErrorKind::GetWrongType)),
                }
            }
        }
    }
}

/// `#[wireshape(tag = "...")]`: a single flat object carries the
/// discriminator alongside the payload's own fields, e.g.
/// `{"type":"Person","name":"X","age":1}`. The whole object is captured up
/// front since the tag key isn't guaranteed to appear first; the tag entry
/// is then stripped and the remainder re-presented as the payload's own
/// record to decode.
fn derive_enum_decode_tagged(name: &Ident, variants: &[VariantInfo], tag_key: &str) -> TokenStream2 {
    let arms: Vec<TokenStream2> = variants
        .iter()
        .map(|v| {
            let VariantInfo { ident, tag, .. } = v;
            match &v.payload_ty {
                None => quote! {
                    #tag => Ok(#name::#ident),
                },
                Some(_) => quote! {
                    #tag => {
                        let mut payload_src = wireshape_core::BufferedSource::new(rest);
                        Ok(#name::#ident(wireshape_core::Decode::decode(&mut payload_src, opts, ctx)?))
                    }
                },
            }
        })
        .collect();

    quote! {
        impl wireshape_core::Decode for #name {
            fn decode<S: wireshape_core::EventSource>(
                src: &mut S,
                opts: &wireshape_core::ReadOptions,
                ctx: &mut wireshape_core::Context,
            ) -> Result<Self, wireshape_core::Error> {
                let events = wireshape_core::capture_value(src)?;
                let (tag_value, rest) = wireshape_core::extract_tagged_entry(&events, #tag_key)
                    .ok_or_else(|| src.error_here(wireshape_core::ErrorKind::MissingKey))?;
                match tag_value.as_str() {
                    #(#arms)*
                    _ => Err(src.error_here(wireshape_core::ErrorKind::UnknownKey)),
                }
            }
        }
    }
}

/// `#[wireshape(untagged)]`: no discriminator at all. The whole object is
/// captured, then matched against each variant's payload shape (first
/// declaration wins on a tie) purely by its set of field names. Every
/// non-unit variant's payload type must implement `RecordPeek + Default`.
fn derive_enum_decode_untagged(name: &Ident, variants: &[VariantInfo]) -> TokenStream2 {
    let shape_exprs: Vec<TokenStream2> = variants
        .iter()
        .map(|v| match &v.payload_ty {
            None => quote! { None },
            Some(ty) => quote! { Some(<#ty as wireshape_core::RecordPeek>::static_shape()) },
        })
        .collect();

    let match_arms: Vec<TokenStream2> = variants
        .iter()
        .map(|v| {
            let VariantInfo { index, ident, .. } = v;
            match &v.payload_ty {
                None => quote! {
                    Some(#index) => Ok(#name::#ident),
                },
                Some(_) => quote! {
                    Some(#index) => {
                        let mut payload_src = wireshape_core::BufferedSource::new(events.clone());
                        Ok(#name::#ident(wireshape_core::Decode::decode(&mut payload_src, opts, ctx)?))
                    }
                },
            }
        })
        .collect();

    quote! {
        impl wireshape_core::Decode for #name {
            fn decode<S: wireshape_core::EventSource>(
                src: &mut S,
                opts: &wireshape_core::ReadOptions,
                ctx: &mut wireshape_core::Context,
            ) -> Result<Self, wireshape_core::Error> {
                let events = wireshape_core::capture_value(src)?;
                let shapes: &[Option<&'static wireshape_core::Shape>] = &[#(#shape_exprs),*];
                match wireshape_core::match_variant_by_shapes(&events, shapes) {
                    #(#match_arms)*
                    _ => Err(src.error_here(wireshape_core::ErrorKind::UnknownKey)),
                }
            }
        }
    }
}
