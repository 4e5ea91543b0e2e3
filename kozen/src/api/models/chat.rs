//! API response models for the chat proxy and health check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Successful chat proxy response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Sanitized, length-bounded reply relayed from the upstream service
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Configured runtime mode ("development" or "production")
    pub environment: String,
}
