//! Validated labels for IdP subjects and roles.
//!
//! IdP deployments disagree on whether `user.id` is a JSON number or a string, so both
//! label types deserialize from either and store the decimal text.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

const LABEL_MAX_LEN: usize = 128;

macro_rules! def_label {
	($name:ident, $kind:literal, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "RawLabel", into = "String")]
		pub struct $name(Arc<str>);
		impl $name {
			/// Validates and wraps a label.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let value = value.as_ref();

				check($kind, value)?;

				Ok(Self(Arc::from(value)))
			}

			/// Borrowed label text.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<RawLabel> for $name {
			type Error = IdentifierError;

			fn try_from(raw: RawLabel) -> Result<Self, Self::Error> {
				match raw {
					RawLabel::Number(value) => Ok(Self(Arc::from(value.to_string()))),
					RawLabel::Text(value) => Self::new(value),
				}
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0.as_ref().to_owned()
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
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({:?})", $kind, self.as_str())
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Wire form of a label: a JSON number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
	Number(i64),
	Text(String),
}

/// Error returned when a subject id or role label is unusable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The label was empty.
	#[error("{kind} label cannot be empty.")]
	Empty {
		/// `User` or `Role`.
		kind: &'static str,
	},
	/// The label contains whitespace.
	#[error("{kind} label contains whitespace.")]
	ContainsWhitespace {
		/// `User` or `Role`.
		kind: &'static str,
	},
	/// The label is longer than the IdP would ever issue.
	#[error("{kind} label exceeds {max} bytes.")]
	TooLong {
		/// `User` or `Role`.
		kind: &'static str,
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

def_label! { UserId, "User", "Subject identifier assigned by the identity provider." }
def_label! { RoleName, "Role", "Role label attached to an identity; compared case-insensitively." }

impl RoleName {
	/// Compares the role against a label, ignoring ASCII case.
	pub fn matches(&self, label: &str) -> bool {
		self.0.eq_ignore_ascii_case(label)
	}
}

fn check(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	match value {
		"" => Err(IdentifierError::Empty { kind }),
		_ if value.chars().any(char::is_whitespace) =>
			Err(IdentifierError::ContainsWhitespace { kind }),
		_ if value.len() > LABEL_MAX_LEN => Err(IdentifierError::TooLong { kind, max: LABEL_MAX_LEN }),
		_ => Ok(()),
	}
}
