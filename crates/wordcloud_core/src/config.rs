//! Deployment configuration: one explicit structure holding every knob that
//! was previously scattered across resource definitions, plus the resource
//! names derived from it.

use serde::{Deserialize, Serialize};

use crate::throttle::ThrottleConfig;

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_PROJECT_NAME: &str = "wordcloud-generator";
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;
pub const DEFAULT_MEMORY_MB: u32 = 512;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub environment: String,
    pub project_name: String,
    pub timeout_seconds: u32,
    pub memory_mb: u32,
    pub quota_per_day: u64,
    pub rate_limit: f64,
    pub burst_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let throttle = ThrottleConfig::default();
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            memory_mb: DEFAULT_MEMORY_MB,
            quota_per_day: throttle.quota_per_day,
            rate_limit: throttle.rate_limit,
            burst_limit: throttle.burst_limit,
        }
    }
}

impl PipelineConfig {
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_project_name(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = project_name.into();
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u32) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_memory_mb(mut self, memory_mb: u32) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_quota_per_day(mut self, quota_per_day: u64) -> Self {
        self.quota_per_day = quota_per_day;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: f64) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_burst_limit(mut self, burst_limit: u32) -> Self {
        self.burst_limit = burst_limit;
        self
    }

    /// Image bucket name. Bucket names are globally scoped, so the
    /// environment suffix is part of the name.
    pub fn bucket_name(&self) -> String {
        format!("{}-images-{}", self.project_name, self.environment)
    }

    pub fn function_name(&self) -> String {
        format!("{}-{}", self.project_name, self.environment)
    }

    pub fn api_name(&self) -> String {
        format!("{}-api-{}", self.project_name, self.environment)
    }

    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig {
            quota_per_day: self.quota_per_day,
            rate_limit: self.rate_limit,
            burst_limit: self.burst_limit,
        }
    }
}
