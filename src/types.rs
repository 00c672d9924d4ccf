use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("invalid_config: {0}")]
    Validation(String),
    #[error("execution: {0}")]
    Execution(String),
    #[error("fatal_batch: {0}")]
    FatalBatch(String),
}

/// One batch submission: a base URL and the page paths to audit.
///
/// The wire shape matches the JSON config files the tool is driven by:
/// `{ "base": "https://ex.com", "paths": ["/", "/about"], "configName": "ex" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub base: String,
    pub paths: Vec<String>,
    #[serde(rename = "configName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.base.is_empty() {
            return Err(AuditError::Validation("missing base url".into()));
        }
        if Url::parse(&self.base).is_err() {
            return Err(AuditError::Validation(format!(
                "base is not a valid absolute url: {}",
                self.base
            )));
        }
        if self.paths.is_empty() {
            return Err(AuditError::Validation("paths must not be empty".into()));
        }
        Ok(())
    }

    pub fn from_json(data: &[u8]) -> anyhow::Result<Self> {
        let config: AuditConfig =
            serde_json::from_slice(data).context("could not parse audit config json")?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data =
            std::fs::read(path).context(format!("could not read audit config at {:?}", path))?;
        Self::from_json(&data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Error,
}

/// Progress/result record for one submitted batch, addressed by an opaque
/// timestamp-derived id. Owned by the batch that runs it; everyone else
/// reads cloned snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub message: String,
    pub progress: f32,
    pub results: Vec<PerPageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
}

impl Task {
    pub fn new(id: String) -> Self {
        Task {
            id,
            status: TaskStatus::Running,
            message: "Starting audit...".into(),
            progress: 0.0,
            results: vec![],
            folder_name: None,
        }
    }
}

/// Outcome of one (url, device profile) audit pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerPageResult {
    pub url: String,
    pub device: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Location descriptor returned by a storage write. Dereferenceable by the
/// caller: a `/api/files?file=...` url for local storage, a blob url for the
/// remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteLocation {
    pub url: String,
}

/// One report folder as surfaced by the listing operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderInfo {
    pub name: String,
    pub created: DateTime<Utc>,
    pub file_count: usize,
    pub size: u64,
}

/// One artifact within a report folder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub url: String,
    pub download_url: String,
}
