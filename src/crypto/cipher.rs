//! AES-256-CBC with a key-derived IV and caller-managed padding.

// crates.io
use aes::Aes256;
use cbc::cipher::{
	BlockDecryptMut, BlockEncryptMut, KeyIvInit,
	block_padding::NoPadding,
	consts::{U16, U32},
	generic_array::GenericArray,
};
// self
use crate::{_prelude::*, error::FormatError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// AES block length in bytes; also the IV length.
pub const AES_BLOCK: usize = 16;

/// Cipher whose IV is the first [`AES_BLOCK`] bytes of its key.
#[derive(Clone)]
pub struct FixedIvCipher {
	key: [u8; KEY_LEN],
}
impl FixedIvCipher {
	/// Binds the cipher to a 32-byte key.
	pub fn new(key: [u8; KEY_LEN]) -> Self {
		Self { key }
	}

	/// Encrypts a block-aligned buffer in place.
	pub fn encrypt(&self, mut buf: Vec<u8>) -> Result<Vec<u8>, FormatError> {
		let len = check_aligned(&buf)?;

		Aes256CbcEnc::new(self.key(), self.iv())
			.encrypt_padded_mut::<NoPadding>(&mut buf, len)
			.map_err(|_| FormatError::CiphertextLength { len })?;

		Ok(buf)
	}

	/// Decrypts a block-aligned buffer in place; padding is left for the caller.
	pub fn decrypt(&self, mut buf: Vec<u8>) -> Result<Vec<u8>, FormatError> {
		let len = check_aligned(&buf)?;

		Aes256CbcDec::new(self.key(), self.iv())
			.decrypt_padded_mut::<NoPadding>(&mut buf)
			.map_err(|_| FormatError::CiphertextLength { len })?;

		Ok(buf)
	}

	fn key(&self) -> &GenericArray<u8, U32> {
		GenericArray::from_slice(&self.key)
	}

	fn iv(&self) -> &GenericArray<u8, U16> {
		GenericArray::from_slice(&self.key[..AES_BLOCK])
	}
}
impl Debug for FixedIvCipher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FixedIvCipher(<redacted>)")
	}
}

fn check_aligned(buf: &[u8]) -> Result<usize, FormatError> {
	let len = buf.len();

	if len == 0 || len % AES_BLOCK != 0 {
		return Err(FormatError::CiphertextLength { len });
	}

	Ok(len)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn round_trip_preserves_aligned_buffers() {
		let cipher = FixedIvCipher::new([7; KEY_LEN]);
		let plain = b"0123456789abcdef0123456789abcdef".to_vec();
		let sealed = cipher.encrypt(plain.clone()).expect("Aligned buffer should encrypt.");

		assert_ne!(sealed, plain);
		assert_eq!(sealed.len(), plain.len());
		assert_eq!(cipher.decrypt(sealed).expect("Ciphertext should decrypt."), plain);
	}

	#[test]
	fn unaligned_buffers_are_rejected() {
		let cipher = FixedIvCipher::new([1; KEY_LEN]);

		assert!(matches!(
			cipher.decrypt(vec![0; 17]),
			Err(FormatError::CiphertextLength { len: 17 })
		));
		assert!(matches!(cipher.encrypt(Vec::new()), Err(FormatError::CiphertextLength { len: 0 })));
	}

	#[test]
	fn iv_is_derived_from_key() {
		let cipher = FixedIvCipher::new([9; KEY_LEN]);
		let block = vec![0_u8; AES_BLOCK];

		// Same key, same IV: equal plaintext blocks encrypt identically.
		assert_eq!(
			cipher.encrypt(block.clone()).expect("Block should encrypt."),
			cipher.encrypt(block).expect("Block should encrypt.")
		);
	}
}
