// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use component_broker::{
	_preludet::*,
	auth::AppId,
	crypto::{EnvelopeCodec, EnvelopeMessage, FRAME_BLOCK, PlatformMessage},
	error::{AuthenticationError, FormatError},
};

fn codec() -> EnvelopeCodec {
	test_component_config(TEST_COMPONENT_APP_ID)
		.envelope_codec()
		.expect("Fixture key should produce a codec.")
}

fn sample_message() -> PlatformMessage {
	PlatformMessage::new()
		.with_text("ToUserName", "gh_tenant")
		.with_text("FromUserName", "openid-1")
		.with_text("CreateTime", "1700000000")
		.with_text("MsgType", "text")
		.with_text("Content", "<b>hi</b> & 你好")
}

#[test]
fn envelope_roundtrip_preserves_message() {
	let codec = codec();
	let message = sample_message();
	let xml = codec.encrypt_envelope(&message).expect("Encryption should succeed.");
	let envelope = EnvelopeMessage::from_xml(&xml).expect("Outbound XML should parse.");
	let decoded = codec
		.decrypt_envelope(&xml, &envelope.timestamp, &envelope.nonce, &envelope.signature)
		.expect("Decryption should succeed.");

	assert_eq!(decoded, message);
	assert_eq!(decoded.text("Content"), Some("<b>hi</b> & 你好"));
}

#[test]
fn tampered_signature_is_rejected_before_decryption() {
	let codec = codec();
	let envelope =
		codec.seal_with(&sample_message(), "1700000000", "nonce-1").expect("Sealing should succeed.");
	let xml = envelope.to_xml().expect("Envelope should serialize.");
	let mut forged = envelope.signature.clone();

	forged.replace_range(0..1, if forged.starts_with('0') { "1" } else { "0" });

	let err = codec
		.decrypt_envelope(&xml, &envelope.timestamp, &envelope.nonce, &forged)
		.expect_err("Forged signature must be rejected.");

	assert!(matches!(err, Error::Authentication(AuthenticationError::SignatureMismatch)));
	assert!(err.is_untrusted());

	let err = codec
		.decrypt_envelope(&xml, "1700000001", &envelope.nonce, &envelope.signature)
		.expect_err("Changed timestamp must invalidate the signature.");

	assert!(matches!(err, Error::Authentication(AuthenticationError::SignatureMismatch)));

	let mut ciphertext = envelope.ciphertext_b64.clone().into_bytes();

	ciphertext[5] = if ciphertext[5] == b'A' { b'B' } else { b'A' };

	let tampered = EnvelopeMessage {
		ciphertext_b64: String::from_utf8(ciphertext).expect("Base64 stays ASCII."),
		..envelope.clone()
	}
	.to_xml()
	.expect("Envelope should serialize.");
	let err = codec
		.decrypt_envelope(&tampered, &envelope.timestamp, &envelope.nonce, &envelope.signature)
		.expect_err("Changed ciphertext must invalidate the signature.");

	assert!(matches!(err, Error::Authentication(AuthenticationError::SignatureMismatch)));
}

#[test]
fn tampered_ciphertext_fails_even_when_resigned() {
	let codec = codec();
	let sealed = codec.seal("<xml><A>1</A></xml>").expect("Sealing should succeed.");
	let mut raw = STANDARD.decode(&sealed).expect("Sealed output should be base64.");

	// Flipping the first byte corrupts the length prefix in the next plaintext block.
	raw[0] ^= 0x80;

	let tampered = STANDARD.encode(&raw);
	let signature = codec.sign(&tampered, "1700000000", "nonce-1");
	let xml = EnvelopeMessage {
		ciphertext_b64: tampered,
		signature: signature.clone(),
		timestamp: "1700000000".into(),
		nonce: "nonce-1".into(),
	}
	.to_xml()
	.expect("Envelope should serialize.");
	let err = codec
		.decrypt_envelope(&xml, "1700000000", "nonce-1", &signature)
		.expect_err("Corrupted frame must be rejected.");

	assert!(err.is_untrusted());
	assert!(matches!(err, Error::Format(FormatError::Truncated { .. })));
}

#[test]
fn frames_are_bound_to_the_component_identity() {
	let ours = codec();
	let theirs = EnvelopeCodec::new(
		AppId::new("wxsomeoneelse").expect("App fixture should be valid."),
		TEST_MSG_TOKEN,
		TEST_MSG_KEY,
	)
	.expect("Codec should build.");
	let sealed = theirs.seal("<xml/>").expect("Sealing should succeed.");
	let err = ours.open(&sealed).expect_err("Foreign identifier must be rejected.");

	match err {
		Error::Authentication(AuthenticationError::AppIdMismatch { expected, found }) => {
			assert_eq!(expected, TEST_COMPONENT_APP_ID);
			assert_eq!(found, "wxsomeoneelse");
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[test]
fn ciphertext_is_block_aligned_for_every_payload_size() {
	let codec = codec();

	for len in [0, 1, 15, 16, 31, 32, 33, 100] {
		let payload = "x".repeat(len);
		let sealed = codec.seal(&payload).expect("Sealing should succeed.");
		let raw = STANDARD.decode(&sealed).expect("Sealed output should be base64.");

		assert_eq!(raw.len() % FRAME_BLOCK, 0, "payload of {len} bytes");
		assert!(raw.len() >= 20 + len + TEST_COMPONENT_APP_ID.len());
		assert_eq!(codec.open(&sealed).expect("Sealed frame should open."), payload);
	}
}

#[test]
fn invalid_keys_are_configuration_errors() {
	let app = AppId::new(TEST_COMPONENT_APP_ID).expect("App fixture should be valid.");

	assert!(EnvelopeCodec::new(app.clone(), TEST_MSG_TOKEN, "too-short").is_err());
	assert!(EnvelopeCodec::new(app, TEST_MSG_TOKEN, "!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!").is_err());
}
