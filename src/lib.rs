//! OracleSync Library
//!
//! Incremental price-source reconciliation for a lending protocol:
//! consumes on-chain oracle events (source registrations, fallback
//! changes, aggregator updates) and maintains a single authoritative
//! price per asset with provenance and a well-defined fallback path.

pub mod config;
pub mod engine;
pub mod gateway;
pub mod namehash;
pub mod store;
pub mod types;
