//! rrcache
//!
//! A resolver-side DNS answer cache with concurrent TTL decay, paired with a
//! minimal query/response protocol over UDP.
//!
//! # Features
//!
//! * Ordered record cache with per-second TTL decay and dense renumbering
//! * Static records exempt from expiry
//! * Correlation-id matched query transactions with bounded receive waits
//! * Cache-first resolution that installs positive answers under their TTL

/// Record cache, query client and resolution logic
pub mod dns;
