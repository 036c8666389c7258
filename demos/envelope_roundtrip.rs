//! Seals a platform message into a signed envelope and opens it again, the way a
//! callback endpoint would see it.

// crates.io
use color_eyre::Result;
// self
use component_broker::{
	auth::AppId,
	crypto::{EnvelopeCodec, EnvelopeMessage, PlatformMessage},
};

fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt().with_env_filter("component_broker=debug").init();

	let codec = EnvelopeCodec::new(
		AppId::new("wxcomponent0001")?,
		"msg-token",
		"abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG",
	)?;
	let reply = PlatformMessage::new()
		.with_text("ToUserName", "openid-1")
		.with_text("FromUserName", "gh_tenant")
		.with_text("CreateTime", "1700000000")
		.with_text("MsgType", "text")
		.with_text("Content", "Hello from the component.");
	let xml = codec.encrypt_envelope(&reply)?;

	println!("Outbound envelope:\n{xml}");

	let envelope = EnvelopeMessage::from_xml(&xml)?;
	let opened =
		codec.decrypt_envelope(&xml, &envelope.timestamp, &envelope.nonce, &envelope.signature)?;

	println!("Recovered content: {}.", opened.require_text("Content")?);

	Ok(())
}
