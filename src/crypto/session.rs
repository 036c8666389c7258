//! Session tokens handed to end users after web authorization.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE};
use md5::{Digest, Md5};
// self
use crate::{
	_prelude::*,
	crypto::{
		cipher::{AES_BLOCK, FixedIvCipher, KEY_LEN},
		padding,
	},
	error::{AuthenticationError, FormatError},
};

/// Claims recovered from a session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionClaims {
	/// Persistent user identifier the token was minted for.
	pub subject: String,
	/// Expiry instant, second precision.
	pub expires_at: OffsetDateTime,
}

/// Token plus the cookie attributes it should be sent with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionArtifact {
	/// URL-safe base64 token.
	pub token: String,
	/// Absolute expiry, second precision.
	pub expires_at: OffsetDateTime,
	/// Cookie max-age.
	pub max_age: Duration,
}

/// Seals `subject:expires_unix` with a key derived from a seed secret.
///
/// The key is the 32 ASCII bytes of the seed's hex MD5 digest.
#[derive(Clone)]
pub struct SessionSealer {
	cipher: FixedIvCipher,
}
impl SessionSealer {
	/// Derives the sealing key from `seed`.
	pub fn new(seed: &str) -> Self {
		let digest = hex::encode(Md5::digest(seed.as_bytes()));
		let mut key = [0_u8; KEY_LEN];

		key.copy_from_slice(digest.as_bytes());

		Self { cipher: FixedIvCipher::new(key) }
	}

	/// Mints a token for `subject` valid for `ttl` from `now`.
	pub fn seal_at(
		&self,
		subject: &str,
		now: OffsetDateTime,
		ttl: Duration,
	) -> Result<SessionArtifact, FormatError> {
		let expires_at = now.checked_add(ttl).ok_or(FormatError::MalformedClaims)?;
		let mut buf = format!("{subject}:{}", expires_at.unix_timestamp()).into_bytes();

		padding::pad(&mut buf, AES_BLOCK);

		let token = URL_SAFE.encode(self.cipher.encrypt(buf)?);
		let expires_at = OffsetDateTime::from_unix_timestamp(expires_at.unix_timestamp())
			.map_err(|_| FormatError::MalformedClaims)?;

		Ok(SessionArtifact { token, expires_at, max_age: ttl })
	}

	/// Opens a token and rejects it once `now` reaches its expiry.
	pub fn open_at(&self, token: &str, now: OffsetDateTime) -> Result<SessionClaims> {
		let plain = self.cipher.decrypt(URL_SAFE.decode(token).map_err(FormatError::from)?)?;
		let text = std::str::from_utf8(padding::unpad(&plain, AES_BLOCK)?).map_err(FormatError::from)?;
		let (subject, expiry) = text.rsplit_once(':').ok_or(FormatError::MalformedClaims)?;
		let expires_at = expiry
			.parse::<i64>()
			.ok()
			.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
			.ok_or(FormatError::MalformedClaims)?;

		if now >= expires_at {
			return Err(AuthenticationError::SessionExpired.into());
		}

		Ok(SessionClaims { subject: subject.to_owned(), expires_at })
	}

	/// [`seal_at`](Self::seal_at) using the system clock.
	pub fn seal(&self, subject: &str, ttl: Duration) -> Result<SessionArtifact, FormatError> {
		self.seal_at(subject, OffsetDateTime::now_utc(), ttl)
	}

	/// [`open_at`](Self::open_at) using the system clock.
	pub fn open(&self, token: &str) -> Result<SessionClaims> {
		self.open_at(token, OffsetDateTime::now_utc())
	}
}
impl Debug for SessionSealer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SessionSealer(<redacted>)")
	}
}
