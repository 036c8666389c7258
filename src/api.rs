//! Upstream API calls: request construction, transport error mapping, and
//! response decoding into the broker error taxonomy.
//!
//! The platform reports most failures with HTTP 200 and an `errcode` body, so a
//! response is accepted only when its status is 2xx, its `errcode` is absent or
//! zero, and it decodes into the expected shape. Anything else becomes an
//! [`UpstreamError`] that keeps the raw body.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{Method, Request, header::CONTENT_TYPE},
};
use serde::{
	Deserializer,
	de::{DeserializeOwned, Error as DeError, Unexpected},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError, UpstreamError},
	http::{PlatformHttpClient, ResponseMetadata, ResponseMetadataSlot},
	platform::{CallMethod, Endpoint, PlatformDescriptor},
};

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => upstream_failure(endpoint, meta, message),
			_ => upstream_failure(endpoint, meta, "unknown transport failure"),
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(endpoint: Endpoint, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { endpoint: endpoint.label() }.into();
	}

	TransportError::from(err).into()
}

fn upstream_failure(endpoint: Endpoint, meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	UpstreamError::from_raw(endpoint.label(), meta.and_then(|m| m.status), message.to_string())
		.with_retry_after(meta.and_then(|m| m.retry_after))
		.into()
}

#[derive(Deserialize)]
struct ErrcodeProbe {
	#[serde(default)]
	errcode: i64,
}

/// Rejects an empty string where the platform must hand out a value.
pub(crate) fn non_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	let value = String::deserialize(deserializer)?;

	if value.is_empty() {
		return Err(DeError::invalid_value(Unexpected::Str(""), &"a non-empty string"));
	}

	Ok(value)
}

/// Rejects a lifetime that is zero or negative.
pub(crate) fn positive_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
	D: Deserializer<'de>,
{
	let value = i64::deserialize(deserializer)?;

	if value <= 0 {
		return Err(DeError::invalid_value(Unexpected::Signed(value), &"a positive lifetime"));
	}

	Ok(value)
}

/// One upstream call.
#[derive(Clone, Debug)]
pub struct ApiCall<'a> {
	endpoint: Endpoint,
	query: Vec<(&'static str, &'a str)>,
	body: Option<serde_json::Value>,
}
impl<'a> ApiCall<'a> {
	/// Starts a call to `endpoint`.
	pub fn new(endpoint: Endpoint) -> Self {
		Self { endpoint, query: Vec::new(), body: None }
	}

	/// Appends a query parameter.
	pub fn query(mut self, name: &'static str, value: &'a str) -> Self {
		self.query.push((name, value));

		self
	}

	/// Sets the JSON body; only sent for POST endpoints.
	pub fn json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Target endpoint.
	pub fn endpoint(&self) -> Endpoint {
		self.endpoint
	}

	fn into_request(self, descriptor: &PlatformDescriptor) -> Result<Request<Vec<u8>>> {
		let mut url = descriptor.url(self.endpoint)?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter().copied());
		}

		let builder = Request::builder().uri(url.as_str());
		let request = match self.endpoint.method() {
			CallMethod::Get => builder.method(Method::GET).body(Vec::new()),
			CallMethod::Post => {
				let body = serde_json::to_vec(&self.body.unwrap_or(serde_json::Value::Null))
					.map_err(ConfigError::from)?;

				builder.method(Method::POST).header(CONTENT_TYPE, "application/json").body(body)
			},
		};

		Ok(request.map_err(ConfigError::from)?)
	}

	/// Sends the call and decodes a successful body into `T`.
	pub async fn send<C, M, T>(
		self,
		http_client: &C,
		mapper: &M,
		descriptor: &PlatformDescriptor,
	) -> Result<T>
	where
		C: ?Sized + PlatformHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
		T: DeserializeOwned,
	{
		let endpoint = self.endpoint;
		let request = self.into_request(descriptor)?;
		let slot = ResponseMetadataSlot::default();
		let handle = http_client.with_metadata(slot.clone());
		let response = match handle.call(request).await {
			Ok(response) => response,
			Err(e) => {
				let meta = slot.take();

				tracing::warn!(endpoint = endpoint.label(), "Platform call failed in transport.");

				return Err(mapper.map_transport_error(endpoint, meta.as_ref(), e));
			},
		};
		let meta = slot.take().unwrap_or_default();
		let status = response.status();
		let body = response.body();

		tracing::debug!(endpoint = endpoint.label(), status = status.as_u16(), "Platform call completed.");

		decode_body(endpoint, status.as_u16(), meta.retry_after, body)
	}
}

fn decode_body<T>(
	endpoint: Endpoint,
	status: u16,
	retry_after: Option<Duration>,
	body: &[u8],
) -> Result<T>
where
	T: DeserializeOwned,
{
	let failure = || {
		UpstreamError::from_raw(endpoint.label(), Some(status), String::from_utf8_lossy(body))
			.with_retry_after(retry_after)
	};

	if !(200..300).contains(&status) {
		return Err(failure().into());
	}
	if serde_json::from_slice::<ErrcodeProbe>(body).is_ok_and(|probe| probe.errcode != 0) {
		return Err(failure().into());
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
		let detail = format!("{}: {}", e.path(), e.inner());

		failure().with_detail(detail).into()
	})
}
