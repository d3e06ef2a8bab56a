//! Fixtures shared by the integration tests: unsigned token minting, IdP bodies, and
//! mock-IdP brokers.

#![allow(dead_code)]

// std
use std::net::TcpListener;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::MockServer;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use idp_session::{
	auth::{Identity, PermissionSet, RoleName, TokenPair, TokenSecret, UserId},
	flows::{ReqwestSessionBroker, SessionBroker},
	provider::{IdpDescriptor, IdpDescriptorBuilder, RetryPolicy},
	session::Session,
};

/// Refresh token carried by [`session_expiring_in`] sessions.
pub const REFRESH_TOKEN: &str = "refresh-1";

/// Mints an unsigned compact token whose payload only carries `exp`.
pub fn jwt(exp: i64) -> String {
	format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(format!("{{\"exp\":{exp}}}")))
}

/// Mints a token expiring `lifetime` from now.
pub fn jwt_in(lifetime: Duration) -> String {
	jwt((OffsetDateTime::now_utc() + lifetime).unix_timestamp())
}

/// Successful IdP body for the login and refresh endpoints.
pub fn idp_body(token: &str, role: &str) -> String {
	json!({
		"status": true,
		"message": "ok",
		"data": {
			"token": token,
			"user": {
				"id": 7,
				"username": "front-desk",
				"role": role,
				"name": "Front Desk",
				"permissions": ["booking:read", "booking:write"]
			}
		}
	})
	.to_string()
}

/// Descriptor builder pointed at the mock server, with plain HTTP allowed, no retries, and a
/// short request timeout.
pub fn descriptor(server: &MockServer) -> IdpDescriptorBuilder {
	descriptor_at(&server.base_url())
}

/// Descriptor builder pointed at an arbitrary base URL, with the same test settings as
/// [`descriptor`].
pub fn descriptor_at(base_url: &str) -> IdpDescriptorBuilder {
	IdpDescriptor::builder(Url::parse(base_url).expect("Base URL should parse."))
		.allow_insecure_http(true)
		.retry(RetryPolicy::none())
		.request_timeout(Duration::milliseconds(300))
}

/// Base URL of a local port nothing listens on.
pub fn closed_port_url() -> String {
	let listener = TcpListener::bind("127.0.0.1:0").expect("Ephemeral port should bind.");
	let addr = listener.local_addr().expect("Bound listener should report its address.");

	drop(listener);

	format!("http://{addr}")
}

/// Reqwest-backed broker with the default descriptor for `server`.
pub fn broker(server: &MockServer) -> ReqwestSessionBroker {
	broker_with(descriptor(server))
}

/// Reqwest-backed broker built from a customized descriptor.
pub fn broker_with(builder: IdpDescriptorBuilder) -> ReqwestSessionBroker {
	SessionBroker::new(builder.build().expect("Mock descriptor should build."))
}

/// Identity matching [`idp_body`] with the `admin` role.
pub fn identity() -> Identity {
	Identity {
		id: UserId::new("7").expect("User id fixture should be valid."),
		username: "front-desk".into(),
		role: RoleName::new("admin").expect("Role fixture should be valid."),
		display_name: "Front Desk".into(),
		permissions: PermissionSet::new(["booking:read"]).expect("Permission fixture should be valid."),
	}
}

/// Logged-in session whose access token expires `lifetime` from now (negative for expired
/// tokens).
pub fn session_expiring_in(lifetime: Duration) -> Session {
	Session::new(identity(), TokenPair::new(jwt_in(lifetime), Some(TokenSecret::new(REFRESH_TOKEN))))
}
