//! Bot manager API models

use serde::{Deserialize, Serialize};

/// Standard payload wrapper: `{"data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Returned by the deletion endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn deleted() -> Self {
        Self {
            status: "deleted".to_string(),
        }
    }
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Bot registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBotRequest {
    pub name: String,
    pub github_repo_url: String,
    #[serde(default)]
    pub github_branch: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub deploy_command: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub environment: Option<std::collections::BTreeMap<String, String>>,
}

/// A bot whose deploy could not be attempted during a bulk update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkFailure {
    pub bot_id: u64,
    pub message: String,
}
