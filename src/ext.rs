//! Public extension contracts for code that calls downstream APIs on behalf of a session.
//!
//! Downstream callers only ever read the [`SessionEnvelope`](crate::session::SessionEnvelope);
//! the signer contract keeps them independent of the HTTP client they use.

pub mod request_signer;

pub use request_signer::*;
