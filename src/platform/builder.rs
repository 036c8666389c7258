// self
use crate::{
	_prelude::*,
	platform::{
		DEFAULT_API_BASE, DEFAULT_MP_BASE, DEFAULT_OPEN_BASE, PlatformBases, PlatformDescriptor,
	},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum PlatformDescriptorError {
	/// A base URL could not be parsed.
	#[error("The {base} base URL is invalid: {url}.")]
	InvalidBase {
		/// Which base failed to parse.
		base: &'static str,
		/// Offending text.
		url: String,
	},
	/// Base URLs must use HTTPS unless they point at a loopback host.
	#[error("The {base} base URL must use HTTPS: {url}.")]
	InsecureBase {
		/// Which base failed validation.
		base: &'static str,
		/// Base URL that failed validation.
		url: String,
	},
}

/// Builder for [`PlatformDescriptor`] values.
#[derive(Debug, Default)]
pub struct PlatformDescriptorBuilder {
	/// Override for the API host.
	pub api_base: Option<Url>,
	/// Override for the end-user authorization host.
	pub open_base: Option<Url>,
	/// Override for the admin console host.
	pub mp_base: Option<Url>,
}
impl PlatformDescriptorBuilder {
	/// Creates a builder that falls back to the production hosts.
	pub fn new() -> Self {
		Self::default()
	}

	/// Overrides the API host.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the end-user authorization host.
	pub fn open_base(mut self, url: Url) -> Self {
		self.open_base = Some(url);

		self
	}

	/// Overrides the admin console host.
	pub fn mp_base(mut self, url: Url) -> Self {
		self.mp_base = Some(url);

		self
	}

	/// Points every host at one base, as mock servers do.
	pub fn single_base(self, url: Url) -> Self {
		self.api_base(url.clone()).open_base(url.clone()).mp_base(url)
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<PlatformDescriptor, PlatformDescriptorError> {
		let bases = PlatformBases {
			api: or_default("api", self.api_base, DEFAULT_API_BASE)?,
			open: or_default("open", self.open_base, DEFAULT_OPEN_BASE)?,
			mp: or_default("mp", self.mp_base, DEFAULT_MP_BASE)?,
		};
		let descriptor = PlatformDescriptor { bases };

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl PlatformDescriptor {
	fn validate(&self) -> Result<(), PlatformDescriptorError> {
		validate_base("api", &self.bases.api)?;
		validate_base("open", &self.bases.open)?;
		validate_base("mp", &self.bases.mp)?;

		Ok(())
	}
}

fn or_default(
	base: &'static str,
	url: Option<Url>,
	default: &str,
) -> Result<Url, PlatformDescriptorError> {
	match url {
		Some(url) => Ok(url),
		None => Url::parse(default)
			.map_err(|_| PlatformDescriptorError::InvalidBase { base, url: default.to_owned() }),
	}
}

fn validate_base(base: &'static str, url: &Url) -> Result<(), PlatformDescriptorError> {
	let loopback = match url.host() {
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		Some(url::Host::Domain(domain)) => domain == "localhost",
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(PlatformDescriptorError::InsecureBase { base, url: url.to_string() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn plain_http_is_rejected_off_loopback() {
		let err = PlatformDescriptor::builder()
			.api_base(Url::parse("http://api.example.com").expect("URL should parse."))
			.build()
			.expect_err("Non-loopback HTTP must fail.");

		assert_eq!(
			err,
			PlatformDescriptorError::InsecureBase { base: "api", url: "http://api.example.com/".into() }
		);
	}

	#[test]
	fn loopback_hosts_may_use_http() {
		let descriptor = PlatformDescriptor::builder()
			.single_base(Url::parse("http://localhost:4010").expect("URL should parse."))
			.build()
			.expect("Loopback HTTP should validate.");

		assert_eq!(descriptor.bases.mp.as_str(), "http://localhost:4010/");
	}
}
