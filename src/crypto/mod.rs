/// Cryptography module
///
/// Encryption of OAuth tokens at rest

pub mod token_codec;

pub use token_codec::TokenCodec;
