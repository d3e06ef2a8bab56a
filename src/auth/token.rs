//! Token secrets, the access/refresh pair, and the local expiry codec.

pub mod codec;
pub mod pair;
pub mod secret;
