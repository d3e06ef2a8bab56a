//! Auth-domain identifiers, identities, permission sets, and token models.

pub mod id;
pub mod identity;
pub mod permission;
pub mod token;

pub use id::*;
pub use identity::*;
pub use permission::*;
pub use token::{codec::*, pair::*, secret::*};
