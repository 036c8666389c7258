//! Signed, encrypted callback envelope.
//!
//! Frame layout before padding:
//!
//! ```text
//! random[16] | len: u32 (big-endian) | payload[len] | app_id
//! ```
//!
//! The frame is padded to [`FRAME_BLOCK`] bytes, encrypted with [`FixedIvCipher`],
//! and base64 encoded into `Encrypt`. `MsgSignature` is the SHA-1 hex digest of the
//! sorted concatenation of the message token, `Encrypt`, `TimeStamp`, and `Nonce`.

// crates.io
use base64::{
	Engine, alphabet,
	engine::{
		DecodePaddingMode,
		general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{AppId, TokenSecret},
	crypto::{
		self, PlatformMessage,
		cipher::{FixedIvCipher, KEY_LEN},
		padding, signature,
	},
	error::{AuthenticationError, ConfigError, FormatError},
	obs::{self, FlowKind, FlowSpan},
};

/// Padding block of the envelope frame.
pub const FRAME_BLOCK: usize = 32;

const PREFIX_LEN: usize = 16;
const HEADER_LEN: usize = PREFIX_LEN + 4;
const NONCE_LEN: usize = 16;
// Message keys are typed by hand on the platform, so trailing bits are rarely canonical.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
	&alphabet::STANDARD,
	GeneralPurposeConfig::new()
		.with_decode_allow_trailing_bits(true)
		.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Wire fields of one envelope exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvelopeMessage {
	/// Base64 ciphertext carried in `Encrypt`.
	pub ciphertext_b64: String,
	/// Lowercase hex signature carried in `MsgSignature`.
	pub signature: String,
	/// Unix seconds carried in `TimeStamp`.
	pub timestamp: String,
	/// Random string carried in `Nonce`.
	pub nonce: String,
}
impl EnvelopeMessage {
	/// Serializes the envelope with its four platform tags.
	pub fn to_xml(&self) -> Result<String, FormatError> {
		PlatformMessage::new()
			.with_text("Encrypt", &self.ciphertext_b64)
			.with_text("MsgSignature", &self.signature)
			.with_text("TimeStamp", &self.timestamp)
			.with_text("Nonce", &self.nonce)
			.to_xml()
	}

	/// Reads an envelope previously produced by [`to_xml`](Self::to_xml).
	pub fn from_xml(xml: &str) -> Result<Self, FormatError> {
		let message = PlatformMessage::from_xml(xml)?;

		Ok(Self {
			ciphertext_b64: message.require_text("Encrypt")?.to_owned(),
			signature: message.require_text("MsgSignature")?.to_owned(),
			timestamp: message.require_text("TimeStamp")?.to_owned(),
			nonce: message.require_text("Nonce")?.to_owned(),
		})
	}
}

/// Envelope codec bound to one component identity.
#[derive(Clone)]
pub struct EnvelopeCodec {
	app_id: AppId,
	msg_token: TokenSecret,
	cipher: FixedIvCipher,
}
impl EnvelopeCodec {
	/// Creates a codec from the 43-character message key configured on the platform.
	pub fn new(
		app_id: AppId,
		msg_token: impl Into<TokenSecret>,
		encoding_aes_key: &str,
	) -> Result<Self, ConfigError> {
		let decoded = KEY_ENGINE
			.decode(encoding_aes_key)
			.map_err(|e| ConfigError::InvalidKey { reason: e.to_string() })?;
		let key = <[u8; KEY_LEN]>::try_from(decoded.as_slice()).map_err(|_| {
			ConfigError::InvalidKey { reason: format!("expected 32 bytes, got {}", decoded.len()) }
		})?;

		Ok(Self { app_id, msg_token: msg_token.into(), cipher: FixedIvCipher::new(key) })
	}

	/// Identifier every frame is bound to.
	pub fn app_id(&self) -> &AppId {
		&self.app_id
	}

	/// Computes the signature of one exchange.
	pub fn sign(&self, ciphertext_b64: &str, timestamp: &str, nonce: &str) -> String {
		signature::sorted_signature(&[self.msg_token.expose(), ciphertext_b64, timestamp, nonce])
	}

	/// Verifies, decrypts, and parses an inbound envelope.
	///
	/// The signature is checked before any decryption is attempted.
	pub fn decrypt_envelope(
		&self,
		xml: &str,
		timestamp: &str,
		nonce: &str,
		signature: &str,
	) -> Result<PlatformMessage> {
		let _guard = FlowSpan::new(FlowKind::Envelope, "decrypt_envelope").entered();

		obs::observe(FlowKind::Envelope, || {
			let envelope = PlatformMessage::from_xml(xml)?;
			let ciphertext_b64 = envelope.require_text("Encrypt")?;

			self.verify(ciphertext_b64, timestamp, nonce, signature)?;

			let payload = self.open(ciphertext_b64)?;

			Ok(PlatformMessage::from_xml(&payload)?)
		})
	}

	/// Encrypts and signs an outbound message, stamping the current time and a fresh nonce.
	pub fn encrypt_envelope(&self, message: &PlatformMessage) -> Result<String> {
		let timestamp = OffsetDateTime::now_utc().unix_timestamp().to_string();
		let nonce = crypto::random_string(NONCE_LEN);

		Ok(self.seal_with(message, &timestamp, &nonce)?.to_xml()?)
	}

	/// Encrypts and signs an outbound message with caller-supplied timestamp and nonce.
	pub fn seal_with(
		&self,
		message: &PlatformMessage,
		timestamp: &str,
		nonce: &str,
	) -> Result<EnvelopeMessage> {
		let _guard = FlowSpan::new(FlowKind::Envelope, "encrypt_envelope").entered();

		obs::observe(FlowKind::Envelope, || {
			let ciphertext_b64 = self.seal(&message.to_xml()?)?;
			let signature = self.sign(&ciphertext_b64, timestamp, nonce);

			Ok(EnvelopeMessage {
				ciphertext_b64,
				signature,
				timestamp: timestamp.to_owned(),
				nonce: nonce.to_owned(),
			})
		})
	}

	/// Checks a supplied signature in constant time.
	pub fn verify(
		&self,
		ciphertext_b64: &str,
		timestamp: &str,
		nonce: &str,
		supplied: &str,
	) -> Result<(), AuthenticationError> {
		let parts = [self.msg_token.expose(), ciphertext_b64, timestamp, nonce];

		if signature::verify_sorted_signature(supplied, &parts) {
			Ok(())
		} else {
			tracing::warn!(app_id = %self.app_id, "Envelope signature mismatch.");

			Err(AuthenticationError::SignatureMismatch)
		}
	}

	/// Builds, pads, and encrypts a frame around `payload`; returns base64 ciphertext.
	pub fn seal(&self, payload: &str) -> Result<String, FormatError> {
		let len = u32::try_from(payload.len())
			.map_err(|_| FormatError::Oversized { len: payload.len() })?;
		let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + self.app_id.len() + FRAME_BLOCK);

		frame.extend_from_slice(crypto::random_string(PREFIX_LEN).as_bytes());
		frame.extend_from_slice(&len.to_be_bytes());
		frame.extend_from_slice(payload.as_bytes());
		frame.extend_from_slice(self.app_id.as_bytes());
		padding::pad(&mut frame, FRAME_BLOCK);

		Ok(STANDARD.encode(self.cipher.encrypt(frame)?))
	}

	/// Decrypts base64 ciphertext and returns the payload after checking the trailing identifier.
	///
	/// Does not verify the signature; callers holding one should go through
	/// [`decrypt_envelope`](Self::decrypt_envelope).
	pub fn open(&self, ciphertext_b64: &str) -> Result<String> {
		let frame = self.cipher.decrypt(STANDARD.decode(ciphertext_b64).map_err(FormatError::from)?)?;
		let body = padding::unpad(&frame, FRAME_BLOCK)?;

		if body.len() < HEADER_LEN {
			return Err(FormatError::Truncated { len: body.len() }.into());
		}

		let mut len_bytes = [0_u8; 4];

		len_bytes.copy_from_slice(&body[PREFIX_LEN..HEADER_LEN]);

		let msg_len = u32::from_be_bytes(len_bytes) as usize;
		let rest = &body[HEADER_LEN..];

		if msg_len > rest.len() {
			return Err(FormatError::Truncated { len: body.len() }.into());
		}

		let (payload, trailing) = rest.split_at(msg_len);
		let found = std::str::from_utf8(trailing).map_err(FormatError::from)?;

		if found != &*self.app_id {
			tracing::warn!(expected = %self.app_id, found, "Envelope identifier mismatch.");

			return Err(AuthenticationError::AppIdMismatch {
				expected: self.app_id.to_string(),
				found: found.to_owned(),
			}
			.into());
		}

		Ok(std::str::from_utf8(payload).map_err(FormatError::from)?.to_owned())
	}
}
impl Debug for EnvelopeCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EnvelopeCodec").field("app_id", &self.app_id).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

	fn codec(app: &str) -> EnvelopeCodec {
		EnvelopeCodec::new(AppId::new(app).expect("App fixture should be valid."), "token", KEY)
			.expect("Key fixture should decode to 32 bytes.")
	}

	#[test]
	fn key_must_decode_to_32_bytes() {
		let app = AppId::new("wx1").expect("App fixture should be valid.");

		assert!(matches!(
			EnvelopeCodec::new(app.clone(), "token", "c2hvcnQ"),
			Err(ConfigError::InvalidKey { .. })
		));
		assert!(matches!(
			EnvelopeCodec::new(app, "token", "not base64 !!"),
			Err(ConfigError::InvalidKey { .. })
		));
	}

	#[test]
	fn sealed_frames_are_block_aligned() {
		let codec = codec("wxcomponent");

		for len in [0, 1, 11, 12, 43, 44, 200] {
			let payload = "x".repeat(len);
			let sealed = codec.seal(&payload).expect("Payload should seal.");
			let raw = STANDARD.decode(&sealed).expect("Sealed text is base64.");

			assert_eq!(raw.len() % FRAME_BLOCK, 0);
			assert_eq!(codec.open(&sealed).expect("Sealed payload should open."), payload);
		}
	}

	#[test]
	fn open_rejects_foreign_identifier() {
		let sealed = codec("wxA").seal("<xml/>").expect("Payload should seal.");
		let err = codec("wxB").open(&sealed).expect_err("Foreign frame must be rejected.");

		assert!(matches!(
			err,
			Error::Authentication(AuthenticationError::AppIdMismatch { ref found, .. }) if found == "wxA"
		));
	}

	#[test]
	fn open_rejects_unaligned_ciphertext() {
		let err = codec("wx1").open(&STANDARD.encode([0_u8; 20])).expect_err("Must fail.");

		assert!(matches!(err, Error::Format(FormatError::CiphertextLength { len: 20 })));
	}

	#[test]
	fn envelope_xml_carries_the_four_tags() {
		let codec = codec("wx1");
		let xml = codec
			.encrypt_envelope(&PlatformMessage::new().with_text("Content", "hi"))
			.expect("Message should encrypt.");
		let parsed = PlatformMessage::from_xml(&xml).expect("Envelope should parse.");
		let names = parsed.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();

		assert_eq!(names, ["Encrypt", "MsgSignature", "TimeStamp", "Nonce"]);
	}
}
