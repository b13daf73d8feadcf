//! Shared wire types for the depo deposit and wallet service.
//!
//! This crate carries no I/O: it only defines the JSON objects exchanged with
//! the user API, the payment provider and the provider's IPN webhook, plus
//! the signature helpers used to authenticate them.

pub mod objects;
pub mod signature;
