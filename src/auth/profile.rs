//! End-user profile records produced by the web authorization flow.

// self
use crate::{_prelude::*, auth::OpenId};

/// Profile of an end user who completed web authorization against a tenant.
///
/// Known fields are typed; anything else upstream returns is kept in `extra` so
/// the persistence layer can store it verbatim.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Tenant-scoped user identifier.
	pub openid: String,
	/// Cross-tenant identifier, when the tenant is bound to an open account.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unionid: Option<String>,
	/// `1` when the user follows the tenant account, `0` otherwise.
	#[serde(default)]
	pub subscribe: u8,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nickname: Option<String>,
	/// Upstream gender code.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sex: Option<u8>,
	/// Avatar URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub headimgurl: Option<String>,
	/// City.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
	/// Province.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub province: Option<String>,
	/// Country.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub country: Option<String>,
	/// Preferred language.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
	/// Unix seconds of the latest follow.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subscribe_time: Option<i64>,
	/// Remaining upstream fields.
	#[serde(default, flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl UserProfile {
	/// Minimal record for a user who does not follow the tenant account.
	pub fn unsubscribed(openid: &OpenId, unionid: Option<String>) -> Self {
		Self { openid: openid.to_string(), unionid, subscribe: 0, ..Default::default() }
	}

	/// Returns `true` when the user follows the tenant account.
	pub fn is_subscribed(&self) -> bool {
		self.subscribe == 1
	}

	/// Field-merges `other` into `self`: present values overwrite, absent values keep.
	pub fn merge_from(&mut self, other: UserProfile) {
		fn take<T>(slot: &mut Option<T>, value: Option<T>) {
			if value.is_some() {
				*slot = value;
			}
		}

		if !other.openid.is_empty() {
			self.openid = other.openid;
		}

		self.subscribe = other.subscribe;

		take(&mut self.unionid, other.unionid);
		take(&mut self.nickname, other.nickname);
		take(&mut self.sex, other.sex);
		take(&mut self.headimgurl, other.headimgurl);
		take(&mut self.city, other.city);
		take(&mut self.province, other.province);
		take(&mut self.country, other.country);
		take(&mut self.language, other.language);
		take(&mut self.subscribe_time, other.subscribe_time);

		self.extra.extend(other.extra);
	}
}
