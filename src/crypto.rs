//! Symmetric envelope protocol and session sealing.
//!
//! Both schemes run AES-256-CBC with an IV equal to the first 16 bytes of the key.
//! The fixed IV is a wire contract of the counterpart systems: identical
//! plaintexts produce identical ciphertext prefixes, so the envelope relies on its
//! 16-byte random frame prefix and the SHA-1 signature for freshness and integrity.
//! Changing the IV derivation breaks interoperability.

pub mod cipher;
pub mod envelope;
pub mod message;
pub mod padding;
pub mod session;
pub mod signature;

pub use envelope::*;
pub use message::*;
pub use session::*;

// crates.io
use rand::{Rng, distr::Alphanumeric};

/// Generates an ASCII alphanumeric string used for nonces and frame prefixes.
pub fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
