//! Append-only NDJSON audit file with size-based rotation.
//!
//! One JSON object per line.  When the primary file reaches
//! `max_bytes`, generations shift up (`audit.log` → `audit.log.1` →
//! `audit.log.2` …), the oldest beyond `retention` is deleted, and a
//! fresh primary file is started.  There is no index: readers scan the
//! files linearly and filter.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::event::{AuditEvent, AuditEventType, AuditRecord};
use crate::errors::{KioskVaultError, Result};
use crate::redact::redact;

/// Default rotation threshold (5 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Default number of rotated generations kept.
pub const DEFAULT_RETENTION: usize = 5;

/// Criteria for `AuditLog::read_events`.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_type: Option<AuditEventType>,
    pub site_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent `limit` matches.
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(t) = self.event_type {
            if record.event.event_type != t {
                return false;
            }
        }
        if let Some(ref site) = self.site_id {
            if record.event.site_id.as_deref() != Some(site.as_str()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// The audit trail.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    max_bytes: u64,
    retention: usize,
    /// Serializes append-and-maybe-rotate across all writers.
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// Open the audit log at `path`, creating its directory if needed.
    pub fn open(path: &Path, max_bytes: u64, retention: usize) -> Result<Self> {
        if max_bytes == 0 {
            return Err(KioskVaultError::AuditError(
                "max_bytes must be greater than zero".into(),
            ));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    KioskVaultError::AuditError(format!(
                        "cannot create audit directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            retention,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Path of rotated generation `n` (1 = most recent).
    pub fn generation_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    /// Append one event, stamped with the current UTC time.
    ///
    /// Free-text fields (`url`, `result`) are redacted before writing.
    pub fn write_event(&self, mut event: AuditEvent) -> Result<()> {
        event.url = event.url.map(|u| redact(&u));
        event.result = event.result.map(|r| redact(&r));

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.rotate_if_needed()?;

        let record = AuditRecord {
            timestamp: Utc::now(),
            event,
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| KioskVaultError::SerializationError(format!("audit event: {e}")))?;
        line.push('\n');

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| {
            KioskVaultError::AuditError(format!("cannot open {}: {e}", self.path.display()))
        })?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    /// Record an event without failing the caller.
    ///
    /// Errors are logged and dropped; auditing never blocks the
    /// operation being audited.
    pub fn record(&self, event: AuditEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.write_event(event) {
            tracing::warn!(event = event_type.as_str(), error = %e, "failed to write audit event");
        }
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if size >= self.max_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    /// Shift every generation up by one and move the primary file to `.1`.
    fn rotate(&self) -> Result<()> {
        if self.retention == 0 {
            remove_best_effort(&self.path);
            return Ok(());
        }

        remove_best_effort(&self.generation_path(self.retention));

        for n in (1..self.retention).rev() {
            let from = self.generation_path(n);
            if from.exists() {
                fs::rename(&from, self.generation_path(n + 1))?;
            }
        }
        fs::rename(&self.path, self.generation_path(1))?;

        tracing::debug!(path = %self.path.display(), "rotated audit log");
        Ok(())
    }

    /// Read matching records, oldest first, across all generations.
    ///
    /// Lines that fail to parse are skipped.
    pub fn read_events(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let mut files: Vec<PathBuf> = (1..=self.retention)
            .rev()
            .map(|n| self.generation_path(n))
            .collect();
        files.push(self.path.clone());

        let mut matches = Vec::new();
        for path in files {
            let file = match fs::File::open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(KioskVaultError::AuditError(format!(
                        "cannot read {}: {e}",
                        path.display()
                    )))
                }
            };
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AuditRecord>(&line) {
                    Ok(record) if filter.matches(&record) => matches.push(record),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "skipping malformed audit line");
                    }
                }
            }
        }

        if let Some(limit) = filter.limit {
            if matches.len() > limit {
                matches.drain(..matches.len() - limit);
            }
        }
        Ok(matches)
    }
}

fn remove_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete old audit generation");
        }
    }
}
