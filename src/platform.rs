//! Upstream platform description.
//!
//! [`PlatformDescriptor`] carries the three base URLs the broker talks to and
//! [`Endpoint`] names every path it calls, so tests can point the whole broker at
//! a mock server by swapping the descriptor.

/// Builder for [`PlatformDescriptor`].
pub mod builder;
/// Endpoint table and host families.
pub mod endpoint;

pub use builder::*;
pub use endpoint::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Default API host.
pub const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";
/// Default host of end-user authorization pages.
pub const DEFAULT_OPEN_BASE: &str = "https://open.weixin.qq.com";
/// Default host of the component login page.
pub const DEFAULT_MP_BASE: &str = "https://mp.weixin.qq.com";

/// Base URLs declared by a platform descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformBases {
	/// Server-to-server API host.
	pub api: Url,
	/// End-user authorization host.
	pub open: Url,
	/// Admin console host (component login page).
	pub mp: Url,
}

/// Immutable platform descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
	/// Base URLs.
	pub bases: PlatformBases,
}
impl PlatformDescriptor {
	/// Creates a builder seeded with the production hosts.
	pub fn builder() -> PlatformDescriptorBuilder {
		PlatformDescriptorBuilder::new()
	}

	/// Descriptor for the production hosts.
	pub fn production() -> Result<Self, PlatformDescriptorError> {
		Self::builder().build()
	}

	/// Resolves an endpoint against the matching base URL.
	pub fn url(&self, endpoint: Endpoint) -> Result<Url, ConfigError> {
		let base = match endpoint.host() {
			Host::Api => &self.bases.api,
			Host::Open => &self.bases.open,
			Host::Mp => &self.bases.mp,
		};

		base.join(endpoint.path())
			.map_err(|source| ConfigError::InvalidUrl { url: endpoint.path().to_owned(), source })
	}
}
