//! Security utilities.
//!
//! Backup jobs log error text coming straight from the object store client
//! and from configuration parsing. That text can echo access keys, signed
//! headers, or endpoint URLs with embedded user info, so everything written
//! to the persistent log sinks is scrubbed first.

pub mod credential_scrubber;

pub use credential_scrubber::{redact_literals, safe_error_message, scrub_credentials};
