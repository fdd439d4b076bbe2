//! Desired and observed deployment state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wordcloud_core::config::PipelineConfig;
use wordcloud_core::object_store::BucketSettings;
use wordcloud_core::storage_keys::DEFAULT_KEY_PREFIX;
use wordcloud_core::throttle::ThrottleConfig;

/// Custom-runtime Lambda contract: the zip carries an executable named
/// `bootstrap`.
pub const LAMBDA_RUNTIME: &str = "provided.al2023";
pub const LAMBDA_HANDLER: &str = "bootstrap";
pub const API_ROUTE: &str = "/generate";

/// The packaged deployment artifact: zip location plus a base64-encoded
/// SHA-256 of the zip bytes, directly comparable to the code hash the
/// provider reports for a deployed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub zip_path: String,
    pub source_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    pub settings: BucketSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub runtime: String,
    pub handler: String,
    pub memory_mb: u32,
    pub timeout_seconds: u32,
    pub environment: BTreeMap<String, String>,
    pub artifact: ArtifactSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub name: String,
    pub route: String,
    pub methods: Vec<String>,
    pub cors_enabled: bool,
    pub throttle: ThrottleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    pub bucket: BucketSpec,
    pub function: FunctionSpec,
    pub api: ApiSpec,
}

/// What the provider currently reports. Resources that do not exist yet are
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    pub bucket: Option<BucketSpec>,
    pub function: Option<ObservedFunction>,
    pub api: Option<ApiSpec>,
}

/// Deployed-function shape: like [`FunctionSpec`] but the provider reports
/// only the code hash, never the local zip path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedFunction {
    pub name: String,
    pub runtime: String,
    pub handler: String,
    pub memory_mb: u32,
    pub timeout_seconds: u32,
    pub environment: BTreeMap<String, String>,
    pub source_hash: String,
}

/// Runtime environment handed to the function. The throttle numbers ride
/// along because rate limiting executes inside the gateway handler.
fn function_environment(config: &PipelineConfig) -> BTreeMap<String, String> {
    let mut environment = BTreeMap::new();
    environment.insert("BUCKET_NAME".to_string(), config.bucket_name());
    environment.insert("KEY_PREFIX".to_string(), DEFAULT_KEY_PREFIX.to_string());
    environment.insert("LOG_LEVEL".to_string(), "info".to_string());
    environment.insert(
        "QUOTA_PER_DAY".to_string(),
        config.quota_per_day.to_string(),
    );
    environment.insert("RATE_LIMIT".to_string(), config.rate_limit.to_string());
    environment.insert("BURST_LIMIT".to_string(), config.burst_limit.to_string());
    environment
}

/// The full desired deployment for one configuration and one packaged
/// artifact.
pub fn desired_state_from(config: &PipelineConfig, artifact: &ArtifactSpec) -> DesiredState {
    DesiredState {
        bucket: BucketSpec {
            name: config.bucket_name(),
            settings: BucketSettings::strict(),
        },
        function: FunctionSpec {
            name: config.function_name(),
            runtime: LAMBDA_RUNTIME.to_string(),
            handler: LAMBDA_HANDLER.to_string(),
            memory_mb: config.memory_mb,
            timeout_seconds: config.timeout_seconds,
            environment: function_environment(config),
            artifact: artifact.clone(),
        },
        api: ApiSpec {
            name: config.api_name(),
            route: API_ROUTE.to_string(),
            methods: vec!["POST".to_string(), "OPTIONS".to_string()],
            cors_enabled: true,
            throttle: config.throttle(),
        },
    }
}
