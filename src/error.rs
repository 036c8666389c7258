//! Broker-level error types shared across the codec, cache, stores, and flows.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Message signature or identity check failed.
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),
	/// Message could not be decoded.
	#[error(transparent)]
	Format(#[from] FormatError),
	/// Upstream platform answered without the expected success fields.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// No refresh credential is registered for the tenant.
	#[error("No credential is registered for tenant `{tenant}`.")]
	UnknownTenant {
		/// Tenant identifier that was looked up.
		tenant: String,
	},
}
impl Error {
	/// Returns `true` when the error means an inbound message cannot be trusted.
	///
	/// Signature failures and malformed frames are handled identically by callers.
	pub fn is_untrusted(&self) -> bool {
		matches!(self, Self::Authentication(_) | Self::Format(_))
	}
}

/// Signature, identity, or session checks that failed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthenticationError {
	/// Recomputed message signature differs from the supplied one.
	#[error("Message signature verification failed.")]
	SignatureMismatch,
	/// The identifier trailing the decrypted frame is not the configured app id.
	#[error("Message was sealed for `{found}` instead of `{expected}`.")]
	AppIdMismatch {
		/// Identifier this codec is bound to.
		expected: String,
		/// Identifier recovered from the frame.
		found: String,
	},
	/// Session token is past its expiry instant.
	#[error("Session token has expired.")]
	SessionExpired,
}

/// Structural decoding failures for envelopes, frames, and session tokens.
#[derive(Debug, ThisError)]
pub enum FormatError {
	/// Ciphertext is not valid base64.
	#[error("Ciphertext is not valid base64.")]
	Base64(#[from] base64::DecodeError),
	/// Ciphertext is empty or not aligned to the cipher block.
	#[error("Ciphertext length {len} is not a positive multiple of the cipher block.")]
	CiphertextLength {
		/// Observed ciphertext length in bytes.
		len: usize,
	},
	/// Trailing padding is out of range or inconsistent.
	#[error("Frame padding is invalid (pad byte {pad}).")]
	Padding {
		/// Final byte of the decrypted buffer.
		pad: u8,
	},
	/// Frame is shorter than its header or declared length.
	#[error("Frame is truncated ({len} bytes after unpadding).")]
	Truncated {
		/// Unpadded frame length in bytes.
		len: usize,
	},
	/// Decrypted text is not UTF-8.
	#[error("Decrypted text is not valid UTF-8.")]
	Utf8(#[from] std::str::Utf8Error),
	/// XML could not be read or written.
	#[error("XML error: {message}.")]
	Xml {
		/// Parser or writer message.
		message: String,
	},
	/// Required XML element is absent.
	#[error("Required element `{element}` is missing.")]
	MissingElement {
		/// Element name.
		element: &'static str,
	},
	/// Session token plaintext is not `subject:expiry`.
	#[error("Session claims are malformed.")]
	MalformedClaims,
	/// Payload does not fit the 32-bit length prefix.
	#[error("Payload of {len} bytes exceeds the frame length prefix.")]
	Oversized {
		/// Payload length in bytes.
		len: usize,
	},
}
impl FormatError {
	/// Wraps an XML reader/writer failure.
	pub fn xml(e: impl Display) -> Self {
		Self::Xml { message: e.to_string() }
	}
}

/// Upstream response that lacks its success fields or carries a failure status.
///
/// The raw body is kept verbatim for diagnostics. The core never retries; the
/// caller decides based on [`UpstreamError::is_credential_invalid`] or the status.
#[derive(Clone, Debug, ThisError)]
#[error("Upstream `{endpoint}` returned an unusable response: {raw}")]
pub struct UpstreamError {
	/// Stable label of the endpoint that was called.
	pub endpoint: &'static str,
	/// HTTP status code, when available.
	pub status: Option<u16>,
	/// Platform `errcode`, when the body carried one.
	pub errcode: Option<i64>,
	/// Platform `errmsg`, when the body carried one.
	pub errmsg: Option<String>,
	/// Decode failure detail, when the body did not match the expected shape.
	pub detail: Option<String>,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
	/// Raw response body.
	pub raw: String,
}
impl UpstreamError {
	const INVALID_CREDENTIAL_CODES: [i64; 3] = [40001, 40014, 42001];

	/// Builds an error from a raw body, extracting `errcode`/`errmsg` when present.
	pub fn from_raw(endpoint: &'static str, status: Option<u16>, raw: impl Into<String>) -> Self {
		let raw = raw.into();
		let parsed = serde_json::from_str::<serde_json::Value>(&raw).ok();
		let errcode = parsed.as_ref().and_then(|v| v.get("errcode")).and_then(|v| v.as_i64());
		let errmsg = parsed
			.as_ref()
			.and_then(|v| v.get("errmsg"))
			.and_then(|v| v.as_str())
			.map(ToOwned::to_owned);

		Self { endpoint, status, errcode, errmsg, detail: None, retry_after: None, raw }
	}

	/// Attaches a decode failure detail.
	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());

		self
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}

	/// Returns `true` when upstream reports an expired or invalid access token.
	pub fn is_credential_invalid(&self) -> bool {
		self.errcode.is_some_and(|code| Self::INVALID_CREDENTIAL_CODES.contains(&code))
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A request or redirect URL is invalid.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Platform descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::platform::PlatformDescriptorError),
	/// A configured identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Message key does not decode to a 32-byte AES key.
	#[error("Message key is invalid: {reason}.")]
	InvalidKey {
		/// Why the key was rejected.
		reason: String,
	},
	/// Required environment variable is not set.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// Environment variable is set but cannot be parsed.
	#[error("Environment variable `{name}` has an invalid value.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
	},
	/// The platform has not pushed a verify ticket yet.
	#[error("No component verify ticket has been received yet.")]
	MissingVerifyTicket,
	/// A request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the platform.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete in time.
	#[error("Request to `{endpoint}` timed out.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the platform.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
