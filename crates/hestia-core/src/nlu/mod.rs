//! Natural-language understanding boundary.
//!
//! The classification itself (tokenizing, scoring) happens in an external
//! service; this module only defines the wire-shaped response model and the
//! client trait the dialog layer calls.

pub mod client;
pub mod model;

pub use client::NluClient;
pub use model::{NluEntity, NluIntent, NluResponse};
