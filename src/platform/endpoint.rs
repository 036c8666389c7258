// self
use crate::_prelude::*;

/// Host family an endpoint lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Host {
	/// Server-to-server API.
	Api,
	/// End-user authorization pages.
	Open,
	/// Admin console.
	Mp,
}

/// HTTP method an endpoint is called with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallMethod {
	/// Query parameters only.
	Get,
	/// JSON body plus query parameters.
	Post,
}

/// Upstream endpoints used by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// Mints the component access token.
	ComponentToken,
	/// Creates a pre-authorization code.
	PreAuthCode,
	/// Exchanges an authorization code for tenant credentials.
	QueryAuth,
	/// Reads a tenant's account and authorization info.
	AuthorizerInfo,
	/// Refreshes a tenant access token.
	AuthorizerToken,
	/// Mints a JS-SDK or card ticket.
	Ticket,
	/// Exchanges an end-user web authorization code.
	WebAccessToken,
	/// Reads subscription info for a follower.
	UserInfo,
	/// Reads the full profile with a web access token.
	SnsUserInfo,
	/// Component login page (browser redirect).
	ComponentLogin,
	/// End-user authorization page (browser redirect).
	WebAuthorize,
}
impl Endpoint {
	/// Stable label used in logs and errors.
	pub const fn label(self) -> &'static str {
		match self {
			Endpoint::ComponentToken => "component_token",
			Endpoint::PreAuthCode => "pre_auth_code",
			Endpoint::QueryAuth => "query_auth",
			Endpoint::AuthorizerInfo => "authorizer_info",
			Endpoint::AuthorizerToken => "authorizer_token",
			Endpoint::Ticket => "ticket",
			Endpoint::WebAccessToken => "web_access_token",
			Endpoint::UserInfo => "user_info",
			Endpoint::SnsUserInfo => "sns_user_info",
			Endpoint::ComponentLogin => "component_login",
			Endpoint::WebAuthorize => "web_authorize",
		}
	}

	/// Absolute path on the endpoint's host.
	pub const fn path(self) -> &'static str {
		match self {
			Endpoint::ComponentToken => "/cgi-bin/component/api_component_token",
			Endpoint::PreAuthCode => "/cgi-bin/component/api_create_preauthcode",
			Endpoint::QueryAuth => "/cgi-bin/component/api_query_auth",
			Endpoint::AuthorizerInfo => "/cgi-bin/component/api_get_authorizer_info",
			Endpoint::AuthorizerToken => "/cgi-bin/component/api_authorizer_token",
			Endpoint::Ticket => "/cgi-bin/ticket/getticket",
			Endpoint::WebAccessToken => "/sns/oauth2/component/access_token",
			Endpoint::UserInfo => "/cgi-bin/user/info",
			Endpoint::SnsUserInfo => "/sns/userinfo",
			Endpoint::ComponentLogin => "/cgi-bin/componentloginpage",
			Endpoint::WebAuthorize => "/connect/oauth2/authorize",
		}
	}

	/// Host family.
	pub const fn host(self) -> Host {
		match self {
			Endpoint::ComponentLogin => Host::Mp,
			Endpoint::WebAuthorize => Host::Open,
			_ => Host::Api,
		}
	}

	/// Method the broker calls the endpoint with.
	pub const fn method(self) -> CallMethod {
		match self {
			Endpoint::Ticket
			| Endpoint::WebAccessToken
			| Endpoint::UserInfo
			| Endpoint::SnsUserInfo
			| Endpoint::ComponentLogin
			| Endpoint::WebAuthorize => CallMethod::Get,
			_ => CallMethod::Post,
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.label())
	}
}
