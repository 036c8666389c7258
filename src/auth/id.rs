//! Strongly typed identifiers for components, tenants, and end users.
//!
//! Platform identifiers are printable ASCII (`wx` app ids, base64-ish open ids), so
//! anything else is rejected at construction and on deserialization.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates and wraps `value`.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				Self::try_from(value.as_ref().to_owned())
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				check_identifier($kind, &value).map(|()| Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Longest identifier accepted; platform ids are well below this.
pub const IDENTIFIER_MAX_LEN: usize = 64;

/// Identifier validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// `App`, `Tenant`, or `OpenId`.
		kind: &'static str,
	},
	/// The identifier holds a character outside printable ASCII.
	#[error("{kind} identifier contains {found:?}.")]
	InvalidCharacter {
		/// `App`, `Tenant`, or `OpenId`.
		kind: &'static str,
		/// First offending character.
		found: char,
	},
	/// The identifier is longer than [`IDENTIFIER_MAX_LEN`].
	#[error("{kind} identifier is {len} bytes long.")]
	TooLong {
		/// `App`, `Tenant`, or `OpenId`.
		kind: &'static str,
		/// Observed length.
		len: usize,
	},
}

def_id! { AppId, "App identifier of the integrating component itself.", "App" }
def_id! { TenantId, "App identifier of one independently-authorized sub-account.", "Tenant" }
def_id! { OpenId, "End-user identifier scoped to a single tenant.", "OpenId" }

fn check_identifier(kind: &'static str, raw: &str) -> Result<(), IdentifierError> {
	if raw.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if let Some(found) = raw.chars().find(|c| !c.is_ascii_graphic()) {
		return Err(IdentifierError::InvalidCharacter { kind, found });
	}
	if raw.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, len: raw.len() });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_blank_and_non_ascii() {
		assert_eq!(AppId::new(""), Err(IdentifierError::Empty { kind: "App" }));
		assert_eq!(
			TenantId::new("wx0123 "),
			Err(IdentifierError::InvalidCharacter { kind: "Tenant", found: ' ' })
		);
		assert!(OpenId::new("o6_bmjrPTlm6_2sgVt7hMZOPfL2M\u{00A0}").is_err());

		let tenant = TenantId::new("wx0123456789abcdef").expect("Tenant fixture should be valid.");

		assert_eq!(&*tenant, "wx0123456789abcdef");
		assert_eq!(format!("{tenant:?}"), "Tenant(wx0123456789abcdef)");
	}

	#[test]
	fn deserialization_goes_through_validation() {
		let openid: OpenId = serde_json::from_str("\"o6_bmjrPTlm6_2sgVt7hMZOPfL2M\"")
			.expect("Open id should deserialize.");

		assert_eq!(openid.len(), 28);
		assert!(serde_json::from_str::<TenantId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<AppId>("\"\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		AppId::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert_eq!(
			AppId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { kind: "App", len: IDENTIFIER_MAX_LEN + 1 })
		);
	}

	#[test]
	fn map_lookups_accept_plain_strings() {
		let map: HashMap<TenantId, u8> = HashMap::from_iter([(
			TenantId::new("wx-lookup").expect("Tenant used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("wx-lookup"), Some(&7));
	}
}
