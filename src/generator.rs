//! External auto-generation of a class timetable.
//!
//! The optimizer itself lives outside this crate. It is called per class
//! and answers with a list of placed lessons, which the schedule service
//! validates before applying.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::schedule::Day;

/// One lesson placed by the generator; ids are assigned when applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSlot {
    pub day: Day,
    pub start_period: u8,
    pub duration: u8,
    pub subject_code: String,
    pub subject_name: String,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub slots: Option<Vec<GeneratedSlot>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationRequest<'a> {
    term: &'a str,
    department: &'a str,
    class_level: &'a str,
}

#[async_trait]
pub trait AutoGenerator: Send + Sync {
    async fn generate(
        &self,
        term: &str,
        department: &str,
        class_level: &str,
    ) -> Result<GenerationResult, GeneratorError>;
}

/// Posts `{term, department, classLevel}` to the configured endpoint
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeneratorError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AutoGenerator for HttpGenerator {
    async fn generate(
        &self,
        term: &str,
        department: &str,
        class_level: &str,
    ) -> Result<GenerationResult, GeneratorError> {
        let body = GenerationRequest {
            term,
            department,
            class_level,
        };
        log::debug!("Requesting generated schedule for {} ({}) in {}", class_level, department, term);

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(request_error)?;
        let parsed: Result<GenerationResult, _> = serde_json::from_slice(&bytes);

        if !status.is_success() {
            let message = parsed
                .map(|r| r.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(GeneratorError::Rejected(message));
        }

        parsed.map_err(|e| GeneratorError::InvalidResult(e.to_string()))
    }
}

fn request_error(err: reqwest::Error) -> GeneratorError {
    if err.is_timeout() {
        GeneratorError::Timeout
    } else {
        GeneratorError::Request(err.to_string())
    }
}

/// Stand-in used when no generator endpoint is configured
pub struct UnconfiguredGenerator;

#[async_trait]
impl AutoGenerator for UnconfiguredGenerator {
    async fn generate(
        &self,
        _term: &str,
        _department: &str,
        _class_level: &str,
    ) -> Result<GenerationResult, GeneratorError> {
        Err(GeneratorError::Unavailable)
    }
}
