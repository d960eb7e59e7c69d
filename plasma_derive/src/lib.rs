//! Derive macros for the plasma-store crate.
//!
//! Provides `#[derive(BinaryCodec)]`, which implements the crate's `Encode` and
//! `Decode` traits for structs.

mod binary_codec;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` for a struct.
///
/// Fields are written in declaration order. A field annotated with
/// `#[binary_codec(signature)]` is part of the stored form but is left out of
/// the signing payload produced by `Encode::encode_unsigned`.
#[proc_macro_derive(BinaryCodec, attributes(binary_codec))]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}
