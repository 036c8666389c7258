//! Pad-length-as-byte-value padding over configurable block sizes.
//!
//! Pad lengths are always in `1..=block`; an aligned input gains a full block.

// self
use crate::error::FormatError;

/// Appends padding so `buf.len()` becomes a multiple of `block`.
pub fn pad(buf: &mut Vec<u8>, block: usize) {
	debug_assert!((1..=u8::MAX as usize).contains(&block));

	let pad = block - buf.len() % block;

	buf.resize(buf.len() + pad, pad as u8);
}

/// Validates and strips padding, returning the unpadded prefix.
pub fn unpad(buf: &[u8], block: usize) -> Result<&[u8], FormatError> {
	let Some(&last) = buf.last() else {
		return Err(FormatError::Truncated { len: 0 });
	};
	let pad = last as usize;

	if pad == 0 || pad > block || pad > buf.len() {
		return Err(FormatError::Padding { pad: last });
	}

	let (body, tail) = buf.split_at(buf.len() - pad);

	if tail.iter().any(|&byte| byte != last) {
		return Err(FormatError::Padding { pad: last });
	}

	Ok(body)
}
