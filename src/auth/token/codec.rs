//! Local decoding of the `exp` claim carried by compact JWT access tokens.
//!
//! Nothing here verifies signatures: the identity provider vouched for the token when it
//! issued it, and the broker only needs to know when it stops being accepted. Every
//! malformed input decodes to `None` so callers treat the expiry as unknown and refresh on
//! the next evaluation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Number;
// self
use crate::_prelude::*;

#[derive(Deserialize)]
struct ExpiryClaim {
	exp: Number,
}

/// Decodes the `exp` claim (seconds) of a compact token into epoch milliseconds.
pub fn decode_expiry(token: &str) -> Option<i64> {
	let mut segments = token.split('.');
	let _header = segments.next().filter(|segment| !segment.is_empty())?;
	let payload = segments.next().filter(|segment| !segment.is_empty())?;
	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claim = serde_json::from_slice::<ExpiryClaim>(&bytes).ok()?;

	seconds_to_millis(&claim.exp)
}

/// Decodes the `exp` claim into an absolute instant.
pub fn decode_expiry_at(token: &str) -> Option<OffsetDateTime> {
	decode_expiry(token).and_then(millis_to_instant)
}

pub(crate) fn millis_to_instant(millis: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

pub(crate) fn instant_to_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn seconds_to_millis(exp: &Number) -> Option<i64> {
	if let Some(secs) = exp.as_i64() {
		return secs.checked_mul(1_000);
	}

	let secs = exp.as_f64()?;
	let millis = (secs * 1_000.).trunc();

	if millis.is_finite() && millis >= i64::MIN as f64 && millis <= i64::MAX as f64 {
		Some(millis as i64)
	} else {
		None
	}
}
