//! Identity-provider descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes the validated configuration (`IdpDescriptor`) derived from the IdP
//! base URL: endpoints, refresh cookie name, refresh threshold, request timeout,
//! single-flight window, and retry policy. `strategy` defines [`ProviderStrategy`], the hook
//! flows use to admit identities and classify failed IdP responses.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
