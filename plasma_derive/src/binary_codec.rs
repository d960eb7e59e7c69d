//! Derive macro for the crate's binary codec.
//!
//! # Supported Types
//!
//! - **Named structs**: `struct Input { blk_num: u64, tx_idx: u32 }`
//! - **Tuple structs**: `struct Hash(pub [u8; 32])`
//! - **Unit structs**: `struct Marker`
//!
//! Enums and unions are rejected at compile time.
//!
//! # Signature fields
//!
//! `#[binary_codec(signature)]` marks a field that is stored but not signed.
//! The generated `encode` writes every field, the generated `encode_unsigned`
//! skips marked fields and recurses with `encode_unsigned` into the rest.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

/// A field as seen by the generator: how to reach it and whether it is signed.
struct CodecField {
    access: TokenStream2,
    signature: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "BinaryCodec can only be derived for structs",
        ));
    };

    let fields = collect_fields(&data.fields)?;

    let encode_all = fields.iter().map(|f| {
        let access = &f.access;
        quote! { crate::types::encoding::Encode::encode(&self.#access, out); }
    });

    let encode_unsigned = fields.iter().filter(|f| !f.signature).map(|f| {
        let access = &f.access;
        quote! { crate::types::encoding::Encode::encode_unsigned(&self.#access, out); }
    });

    let construct = match &data.fields {
        Fields::Named(named) => {
            let decoded = named.named.iter().map(|f| {
                let ident = &f.ident;
                quote! { #ident: crate::types::encoding::Decode::decode(input)?, }
            });
            quote! { Self { #(#decoded)* } }
        }
        Fields::Unnamed(unnamed) => {
            let decoded = unnamed
                .unnamed
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)?, });
            quote! { Self( #(#decoded)* ) }
        }
        Fields::Unit => quote! { Self },
    };

    let silence_unused = if fields.is_empty() {
        quote! { let _ = &input; }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #(#encode_all)*
            }

            #[allow(unused_variables)]
            fn encode_unsigned<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #(#encode_unsigned)*
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(
                input: &mut &[u8],
            ) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #silence_unused
                Ok(#construct)
            }
        }
    })
}

fn collect_fields(fields: &Fields) -> syn::Result<Vec<CodecField>> {
    match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|f| {
                let ident = &f.ident;
                Ok(CodecField {
                    access: quote! { #ident },
                    signature: is_signature_field(f)?,
                })
            })
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let index = syn::Index::from(i);
                Ok(CodecField {
                    access: quote! { #index },
                    signature: is_signature_field(f)?,
                })
            })
            .collect(),
        Fields::Unit => Ok(Vec::new()),
    }
}

/// Returns `true` when the field carries `#[binary_codec(signature)]`.
fn is_signature_field(field: &syn::Field) -> syn::Result<bool> {
    let mut signature = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("binary_codec") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("signature") {
                signature = true;
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported binary_codec option, expected #[binary_codec(signature)]",
                ))
            }
        })?;
    }
    Ok(signature)
}
