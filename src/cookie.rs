//! Typed refresh-cookie handling for the identity provider's `Set-Cookie` / `Cookie` headers.

// crates.io
use cookie::Cookie;
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Refresh token delivered through a `Set-Cookie` response header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshCookie {
	secret: TokenSecret,
	max_age: Option<Duration>,
}
impl RefreshCookie {
	/// Finds the refresh cookie named `name` among raw `Set-Cookie` header values.
	///
	/// Unparseable headers and other cookies are skipped. A cookie that clears the value
	/// (empty value or `Max-Age=0`) counts as absent. When several headers carry the cookie,
	/// the last one wins, matching how user agents apply them.
	pub fn from_set_cookie<'a, I>(name: &str, headers: I) -> Option<Self>
	where
		I: IntoIterator<Item = &'a str>,
	{
		headers
			.into_iter()
			.filter_map(|raw| Cookie::parse(raw).ok())
			.filter(|cookie| cookie.name() == name)
			.last()
			.and_then(|cookie| {
				let max_age = cookie.max_age();

				if cookie.value().trim().is_empty() || max_age.is_some_and(|age| !age.is_positive()) {
					return None;
				}

				Some(Self { secret: TokenSecret::new(cookie.value()), max_age })
			})
	}

	/// Refresh token carried by the cookie.
	pub fn secret(&self) -> &TokenSecret {
		&self.secret
	}

	/// Consumes the cookie, returning the refresh token.
	pub fn into_secret(self) -> TokenSecret {
		self.secret
	}

	/// Lifetime advertised through `Max-Age`, if any.
	pub fn max_age(&self) -> Option<Duration> {
		self.max_age
	}
}

/// Renders a `Cookie` request header value carrying the refresh token.
pub fn cookie_header(name: &str, secret: &TokenSecret) -> String {
	Cookie::new(name, secret.expose()).stripped().to_string()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_cookie_is_extracted_with_attributes() {
		let headers = [
			"session_hint=abc; Path=/",
			"refresh_token=r-123; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=604800",
		];
		let cookie = RefreshCookie::from_set_cookie("refresh_token", headers)
			.expect("Refresh cookie should be found.");

		assert_eq!(cookie.secret().expose(), "r-123");
		assert_eq!(cookie.max_age(), Some(Duration::days(7)));
	}

	#[test]
	fn cleared_or_missing_cookies_are_absent() {
		assert!(RefreshCookie::from_set_cookie("refresh_token", ["other=1"]).is_none());
		assert!(RefreshCookie::from_set_cookie("refresh_token", ["refresh_token=; Path=/"]).is_none());
		assert!(
			RefreshCookie::from_set_cookie("refresh_token", ["refresh_token=x; Max-Age=0"]).is_none()
		);
		assert!(RefreshCookie::from_set_cookie("refresh_token", ["not a cookie"]).is_none());
	}

	#[test]
	fn last_matching_header_wins() {
		let cookie = RefreshCookie::from_set_cookie(
			"refresh_token",
			["refresh_token=old; Path=/", "refresh_token=new; Path=/"],
		)
		.expect("Refresh cookie should be found.");

		assert_eq!(cookie.secret().expose(), "new");
	}

	#[test]
	fn cookie_header_renders_name_value_only() {
		assert_eq!(cookie_header("refresh_token", &TokenSecret::new("r-9")), "refresh_token=r-9");
	}
}
