//! SHA-1 signatures over sorted field concatenations.

// crates.io
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Lowercase hex SHA-1 of `input`.
pub fn sha1_hex(input: &[u8]) -> String {
	hex::encode(Sha1::digest(input))
}

/// Signs the lexicographically sorted concatenation of `parts`.
///
/// Sorting makes the result independent of field order on either side.
pub fn sorted_signature(parts: &[&str]) -> String {
	let mut sorted = parts.to_vec();

	sorted.sort_unstable();

	sha1_hex(sorted.concat().as_bytes())
}

/// Compares a supplied signature with the recomputed one in constant time.
pub fn verify_sorted_signature(supplied: &str, parts: &[&str]) -> bool {
	let expected = sorted_signature(parts);

	expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn signature_ignores_field_order() {
		let a = sorted_signature(&["token", "cipher", "1700000000", "nonce"]);
		let b = sorted_signature(&["nonce", "1700000000", "token", "cipher"]);

		assert_eq!(a, b);
		assert_eq!(a.len(), 40);
		assert!(a.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
	}

	#[test]
	fn signature_matches_manual_digest() {
		// Sorted: "1409304348", "AAA", "token", "xxxxxx".
		let expected = sha1_hex(b"1409304348AAAtokenxxxxxx");

		assert_eq!(sorted_signature(&["token", "AAA", "1409304348", "xxxxxx"]), expected);
	}

	#[test]
	fn verification_rejects_tampering() {
		let parts = ["token", "cipher", "1", "n"];
		let good = sorted_signature(&parts);
		let mut bad = good.clone().into_bytes();

		bad[0] = if bad[0] == b'0' { b'1' } else { b'0' };

		assert!(verify_sorted_signature(&good, &parts));
		assert!(!verify_sorted_signature(&String::from_utf8_lossy(&bad), &parts));
		assert!(!verify_sorted_signature(&good[..39], &parts));
		assert!(!verify_sorted_signature(&good.to_uppercase(), &parts));
	}
}
