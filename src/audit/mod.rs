//! Audit log — append-only structured security event trail.
//!
//! - Event types and the on-disk record shape (`event`)
//! - The rotating NDJSON file writer and linear reader (`log`)

pub mod event;
pub mod log;

pub use event::{AuditEvent, AuditEventType, AuditRecord};
pub use log::{AuditFilter, AuditLog, DEFAULT_MAX_BYTES, DEFAULT_RETENTION};
