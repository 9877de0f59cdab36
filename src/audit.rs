use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use csv::WriterBuilder;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::AuditError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: Option<String>,
    pub performed_by: String,
}

impl AuditEntry {
    pub fn new(action: AuditAction, resource: &str, performed_by: &str) -> Self {
        Self {
            action,
            resource: resource.to_string(),
            resource_id: None,
            details: None,
            performed_by: performed_by.to_string(),
        }
    }

    pub fn resource_id(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Receives a record of every schedule mutation.
///
/// Callers treat failures as non-fatal: they are logged and otherwise ignored.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_action(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Appends entries to a CSV file, writing the header when the file is new
pub struct CsvAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvAuditLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for CsvAuditLog {
    async fn log_action(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let _guard = self.lock.lock().await;
        let file_exists = self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);

        if !file_exists {
            wtr.write_record([
                "timestamp",
                "action",
                "resource",
                "resource_id",
                "details",
                "performed_by",
            ])?;
        }

        let timestamp = Utc::now().to_rfc3339();
        wtr.write_record([
            timestamp.as_str(),
            entry.action.as_str(),
            entry.resource.as_str(),
            entry.resource_id.as_deref().unwrap_or(""),
            entry.details.as_deref().unwrap_or(""),
            entry.performed_by.as_str(),
        ])?;
        wtr.flush()?;
        Ok(())
    }
}

/// Writes entries to the application log only
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn log_action(&self, entry: AuditEntry) -> Result<(), AuditError> {
        log::info!(
            "audit: {} {} {} by {} {}",
            entry.action.as_str(),
            entry.resource,
            entry.resource_id.as_deref().unwrap_or("-"),
            entry.performed_by,
            entry.details.as_deref().unwrap_or("")
        );
        Ok(())
    }
}
