//! Record cache and query client
//!
//! This module provides the client side of a simplified query/response
//! protocol together with the answer cache that fronts it:
//!
//! * `protocol` - wire envelope definitions and JSON encoding
//! * `cache` - record cache with background TTL decay
//! * `client` - transport seam and the query transaction
//! * `resolve` - cache-first lookup orchestration
//! * `context` - client configuration and shared state

/// Record cache with background TTL decay
pub mod cache;

/// Transport seam and query transaction handling
pub mod client;

/// Client configuration and shared context
pub mod context;

/// Wire envelope definitions and JSON encoding
pub mod protocol;

/// Record type definitions
pub mod query_type;

/// Cache-first resolution
pub mod resolve;
