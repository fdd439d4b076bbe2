//! Deployment entrypoint: reconciles the hosted bucket, function, and API
//! surface against the desired state derived from the environment. Run with
//! `--plan` to print the pending delta without touching anything.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use aws_config::BehaviorVersion;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{
    Environment as FunctionEnvironment, FunctionCode, LastUpdateStatus, Runtime, State,
};
use aws_sdk_s3::types::{
    BucketLifecycleConfiguration, BucketLocationConstraint, BucketVersioningStatus,
    CreateBucketConfiguration, ExpirationStatus, LifecycleRule as S3LifecycleRule,
    LifecycleRuleFilter, NoncurrentVersionExpiration, PublicAccessBlockConfiguration,
    ServerSideEncryption as S3SseAlgorithm, ServerSideEncryptionByDefault,
    ServerSideEncryptionConfiguration, ServerSideEncryptionRule, VersioningConfiguration,
};
use base64::prelude::*;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use wordcloud_core::config::PipelineConfig;
use wordcloud_core::object_store::{
    BucketSettings, LifecycleRule, PublicAccessMode, ServerSideEncryption,
};
use wordcloud_core::throttle::ThrottleConfig;
use wordcloud_lambda::logging::{self, log_error, log_info, LogLevel};
use wordcloud_provision::plan::{bucket_policy_document, plan, PlannedAction};
use wordcloud_provision::reconcile::{reconcile, Provisioner};
use wordcloud_provision::state::{
    desired_state_from, ApiSpec, ArtifactSpec, BucketSpec, DesiredState, ObservedFunction,
    ObservedState,
};

const COMPONENT: &str = "provision";
const DEFAULT_ARTIFACT_PATH: &str = "dist/wordcloud_runtime.zip";
const LIFECYCLE_RULE_ID: &str = "expire-noncurrent-images";

const FUNCTION_SETTLE_POLLS: usize = 60;
const FUNCTION_SETTLE_INTERVAL_MS: u64 = 1_000;

/// AWS-backed provider. Observation reads the live resources through the
/// SDK; apply executes one planned action at a time.
struct AwsProvisioner {
    desired: DesiredState,
    s3: aws_sdk_s3::Client,
    lambda: aws_sdk_lambda::Client,
    region: String,
}

impl Provisioner for AwsProvisioner {
    fn observe(&mut self) -> Result<ObservedState, String> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let bucket = self.observe_bucket().await?;
                let function = self.observe_function().await?;
                let api = self.observe_api(function.as_ref());
                Ok(ObservedState {
                    bucket,
                    function,
                    api,
                })
            })
        })
    }

    fn apply(&mut self, action: &PlannedAction) -> Result<(), String> {
        log_info(
            COMPONENT,
            "applying_action",
            json!({ "action": action.to_string() }),
        );
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                match action {
                    PlannedAction::CreateBucket { name } => self.create_bucket(name).await,
                    PlannedAction::PutBucketVersioning { name, enabled } => {
                        self.put_bucket_versioning(name, *enabled).await
                    }
                    PlannedAction::PutBucketEncryption { name, encryption } => {
                        self.put_bucket_encryption(name, *encryption).await
                    }
                    PlannedAction::PutBucketLifecycle { name, rule } => {
                        self.put_bucket_lifecycle(name, *rule).await
                    }
                    PlannedAction::PutBucketAccessPolicy { name, mode } => {
                        self.put_bucket_access_policy(name, *mode).await
                    }
                    PlannedAction::CreateFunction { spec } => self.create_function(spec).await,
                    PlannedAction::UpdateFunctionCode { name, zip_path, .. } => {
                        self.update_function_code(name, zip_path).await
                    }
                    PlannedAction::UpdateFunctionSettings {
                        name,
                        runtime,
                        handler,
                        memory_mb,
                        timeout_seconds,
                    } => {
                        self.update_function_settings(
                            name,
                            runtime,
                            handler,
                            *memory_mb,
                            *timeout_seconds,
                        )
                        .await
                    }
                    PlannedAction::UpdateFunctionEnvironment { name, environment } => {
                        self.update_function_environment(name, environment).await
                    }
                    PlannedAction::PutApiRoute {
                        name,
                        route,
                        methods,
                        cors_enabled,
                    } => self.put_api_route(name, route, methods, *cors_enabled),
                    PlannedAction::PutApiThrottle { name, throttle } => {
                        self.put_api_throttle(name, throttle).await
                    }
                }
            })
        })
    }
}

impl AwsProvisioner {
    async fn observe_bucket(&self) -> Result<Option<BucketSpec>, String> {
        let name = &self.desired.bucket.name;
        if self.s3.head_bucket().bucket(name).send().await.is_err() {
            return Ok(None);
        }

        let versioning_enabled = matches!(
            self.s3
                .get_bucket_versioning()
                .bucket(name)
                .send()
                .await
                .map_err(|error| format!("failed to read versioning for {name}: {error}"))?
                .status(),
            Some(BucketVersioningStatus::Enabled)
        );

        // S3 reports unset subresources as errors; read failures below map
        // to the unset default rather than aborting the observation.
        let encryption = match self.s3.get_bucket_encryption().bucket(name).send().await {
            Ok(output) => {
                let aes256 = output
                    .server_side_encryption_configuration()
                    .map(|configuration| configuration.rules())
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|rule| rule.apply_server_side_encryption_by_default())
                    .any(|default| matches!(default.sse_algorithm(), S3SseAlgorithm::Aes256));
                if aes256 {
                    ServerSideEncryption::Aes256
                } else {
                    ServerSideEncryption::None
                }
            }
            Err(_) => ServerSideEncryption::None,
        };

        let noncurrent_expiry_days = match self
            .s3
            .get_bucket_lifecycle_configuration()
            .bucket(name)
            .send()
            .await
        {
            Ok(output) => output
                .rules()
                .iter()
                .filter_map(|rule| rule.noncurrent_version_expiration())
                .filter_map(|expiration| expiration.noncurrent_days())
                .find(|days| *days > 0)
                .unwrap_or(0) as u32,
            Err(_) => 0,
        };

        let public_access = match self.s3.get_bucket_policy().bucket(name).send().await {
            Ok(output) => classify_policy(name, output.policy()),
            Err(_) => PublicAccessMode::LegacyObjectAcl,
        };

        Ok(Some(BucketSpec {
            name: name.clone(),
            settings: BucketSettings {
                versioning_enabled,
                encryption,
                public_access,
                lifecycle: LifecycleRule {
                    noncurrent_expiry_days,
                },
            },
        }))
    }

    async fn observe_function(&self) -> Result<Option<ObservedFunction>, String> {
        let name = &self.desired.function.name;
        let output = match self.lambda.get_function().function_name(name).send().await {
            Ok(output) => output,
            Err(_) => return Ok(None),
        };
        let Some(configuration) = output.configuration() else {
            return Ok(None);
        };

        let environment = configuration
            .environment()
            .and_then(|environment| environment.variables())
            .map(|variables| {
                variables
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(ObservedFunction {
            name: name.clone(),
            runtime: configuration
                .runtime()
                .map(|runtime| runtime.as_str().to_string())
                .unwrap_or_default(),
            handler: configuration.handler().unwrap_or_default().to_string(),
            memory_mb: configuration.memory_size().unwrap_or(0).max(0) as u32,
            timeout_seconds: configuration.timeout().unwrap_or(0).max(0) as u32,
            environment,
            source_hash: configuration.code_sha256().unwrap_or_default().to_string(),
        }))
    }

    /// The API surface rides on the function: the handler enforces routing,
    /// CORS, and throttling itself, so the observable signal is the set of
    /// throttle keys in the deployed environment.
    fn observe_api(&self, function: Option<&ObservedFunction>) -> Option<ApiSpec> {
        let function = function?;
        let quota_per_day = function.environment.get("QUOTA_PER_DAY")?.parse().ok()?;
        let rate_limit = function.environment.get("RATE_LIMIT")?.parse().ok()?;
        let burst_limit = function.environment.get("BURST_LIMIT")?.parse().ok()?;
        Some(ApiSpec {
            name: self.desired.api.name.clone(),
            route: self.desired.api.route.clone(),
            methods: self.desired.api.methods.clone(),
            cors_enabled: self.desired.api.cors_enabled,
            throttle: ThrottleConfig {
                quota_per_day,
                rate_limit,
                burst_limit,
            },
        })
    }

    async fn create_bucket(&self, name: &str) -> Result<(), String> {
        let mut request = self.s3.create_bucket().bucket(name);
        // us-east-1 is the one region that rejects an explicit constraint.
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to create bucket {name}: {error}"))
    }

    async fn put_bucket_versioning(&self, name: &str, enabled: bool) -> Result<(), String> {
        let status = if enabled {
            BucketVersioningStatus::Enabled
        } else {
            BucketVersioningStatus::Suspended
        };
        self.s3
            .put_bucket_versioning()
            .bucket(name)
            .versioning_configuration(VersioningConfiguration::builder().status(status).build())
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to set versioning on {name}: {error}"))
    }

    async fn put_bucket_encryption(
        &self,
        name: &str,
        encryption: ServerSideEncryption,
    ) -> Result<(), String> {
        match encryption {
            ServerSideEncryption::Aes256 => {
                let by_default = ServerSideEncryptionByDefault::builder()
                    .sse_algorithm(S3SseAlgorithm::Aes256)
                    .build()
                    .map_err(|error| format!("invalid encryption default: {error}"))?;
                let configuration = ServerSideEncryptionConfiguration::builder()
                    .rules(
                        ServerSideEncryptionRule::builder()
                            .apply_server_side_encryption_by_default(by_default)
                            .build(),
                    )
                    .build()
                    .map_err(|error| format!("invalid encryption configuration: {error}"))?;
                self.s3
                    .put_bucket_encryption()
                    .bucket(name)
                    .server_side_encryption_configuration(configuration)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to set encryption on {name}: {error}"))
            }
            ServerSideEncryption::None => self
                .s3
                .delete_bucket_encryption()
                .bucket(name)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to clear encryption on {name}: {error}")),
        }
    }

    async fn put_bucket_lifecycle(&self, name: &str, rule: LifecycleRule) -> Result<(), String> {
        if rule.noncurrent_expiry_days == 0 {
            return self
                .s3
                .delete_bucket_lifecycle()
                .bucket(name)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to clear lifecycle on {name}: {error}"));
        }

        let lifecycle_rule = S3LifecycleRule::builder()
            .id(LIFECYCLE_RULE_ID)
            .status(ExpirationStatus::Enabled)
            .filter(LifecycleRuleFilter::builder().prefix("").build())
            .noncurrent_version_expiration(
                NoncurrentVersionExpiration::builder()
                    .noncurrent_days(rule.noncurrent_expiry_days as i32)
                    .build(),
            )
            .build()
            .map_err(|error| format!("invalid lifecycle rule: {error}"))?;
        let configuration = BucketLifecycleConfiguration::builder()
            .rules(lifecycle_rule)
            .build()
            .map_err(|error| format!("invalid lifecycle configuration: {error}"))?;
        self.s3
            .put_bucket_lifecycle_configuration()
            .bucket(name)
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to set lifecycle on {name}: {error}"))
    }

    async fn put_bucket_access_policy(
        &self,
        name: &str,
        mode: PublicAccessMode,
    ) -> Result<(), String> {
        match bucket_policy_document(name, mode) {
            Some(document) => {
                // Policy-based public read: ACLs stay blocked, the policy
                // channel opens.
                let block = PublicAccessBlockConfiguration::builder()
                    .block_public_acls(true)
                    .ignore_public_acls(true)
                    .block_public_policy(false)
                    .restrict_public_buckets(false)
                    .build();
                self.s3
                    .put_public_access_block()
                    .bucket(name)
                    .public_access_block_configuration(block)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("failed to allow policy-based public read on {name}: {error}")
                    })?;
                self.s3
                    .put_bucket_policy()
                    .bucket(name)
                    .policy(document.to_string())
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to put bucket policy on {name}: {error}"))
            }
            None => {
                let block = PublicAccessBlockConfiguration::builder()
                    .block_public_acls(false)
                    .ignore_public_acls(false)
                    .block_public_policy(false)
                    .restrict_public_buckets(false)
                    .build();
                self.s3
                    .put_public_access_block()
                    .bucket(name)
                    .public_access_block_configuration(block)
                    .send()
                    .await
                    .map_err(|error| format!("failed to configure acl access on {name}: {error}"))?;
                self.s3
                    .delete_bucket_policy()
                    .bucket(name)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to remove bucket policy on {name}: {error}"))
            }
        }
    }

    async fn create_function(
        &self,
        spec: &wordcloud_provision::state::FunctionSpec,
    ) -> Result<(), String> {
        let role = std::env::var("EXECUTION_ROLE_ARN").map_err(|_| {
            "EXECUTION_ROLE_ARN must be configured to create the function".to_string()
        })?;
        let zip = std::fs::read(&spec.artifact.zip_path).map_err(|error| {
            format!("failed to read artifact {}: {error}", spec.artifact.zip_path)
        })?;

        self.lambda
            .create_function()
            .function_name(&spec.name)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .handler(&spec.handler)
            .role(role)
            .memory_size(spec.memory_mb as i32)
            .timeout(spec.timeout_seconds as i32)
            .environment(sdk_environment(&spec.environment))
            .code(FunctionCode::builder().zip_file(Blob::new(zip)).build())
            .send()
            .await
            .map_err(|error| format!("failed to create function {}: {error}", spec.name))?;
        self.wait_for_function_settled(&spec.name).await
    }

    async fn update_function_code(&self, name: &str, zip_path: &str) -> Result<(), String> {
        let zip = std::fs::read(zip_path)
            .map_err(|error| format!("failed to read artifact {zip_path}: {error}"))?;
        self.lambda
            .update_function_code()
            .function_name(name)
            .zip_file(Blob::new(zip))
            .send()
            .await
            .map_err(|error| format!("failed to update code of {name}: {error}"))?;
        self.wait_for_function_settled(name).await
    }

    async fn update_function_settings(
        &self,
        name: &str,
        runtime: &str,
        handler: &str,
        memory_mb: u32,
        timeout_seconds: u32,
    ) -> Result<(), String> {
        self.lambda
            .update_function_configuration()
            .function_name(name)
            .runtime(Runtime::from(runtime))
            .handler(handler)
            .memory_size(memory_mb as i32)
            .timeout(timeout_seconds as i32)
            .send()
            .await
            .map_err(|error| format!("failed to update settings of {name}: {error}"))?;
        self.wait_for_function_settled(name).await
    }

    async fn update_function_environment(
        &self,
        name: &str,
        environment: &BTreeMap<String, String>,
    ) -> Result<(), String> {
        self.lambda
            .update_function_configuration()
            .function_name(name)
            .environment(sdk_environment(environment))
            .send()
            .await
            .map_err(|error| format!("failed to update environment of {name}: {error}"))?;
        self.wait_for_function_settled(name).await
    }

    /// The route and CORS posture are enforced by the handler itself, so the
    /// deployed surface cannot drift from the code. Recording the intent
    /// keeps the applied log complete.
    fn put_api_route(
        &self,
        name: &str,
        route: &str,
        methods: &[String],
        cors_enabled: bool,
    ) -> Result<(), String> {
        if !route.starts_with('/') {
            return Err(format!("route {route} must start with '/'"));
        }
        log_info(
            COMPONENT,
            "api_route_recorded",
            json!({
                "api": name,
                "route": route,
                "methods": methods,
                "cors_enabled": cors_enabled,
            }),
        );
        Ok(())
    }

    /// Throttle numbers ship as function environment keys; merge them into
    /// whatever else the environment carries.
    async fn put_api_throttle(&self, name: &str, throttle: &ThrottleConfig) -> Result<(), String> {
        let function_name = &self.desired.function.name;
        let output = self
            .lambda
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|error| format!("failed to read environment of {function_name}: {error}"))?;
        let mut variables: std::collections::HashMap<String, String> = output
            .environment()
            .and_then(|environment| environment.variables())
            .cloned()
            .unwrap_or_default();
        variables.insert(
            "QUOTA_PER_DAY".to_string(),
            throttle.quota_per_day.to_string(),
        );
        variables.insert("RATE_LIMIT".to_string(), throttle.rate_limit.to_string());
        variables.insert("BURST_LIMIT".to_string(), throttle.burst_limit.to_string());

        self.lambda
            .update_function_configuration()
            .function_name(function_name)
            .environment(
                FunctionEnvironment::builder()
                    .set_variables(Some(variables))
                    .build(),
            )
            .send()
            .await
            .map_err(|error| format!("failed to apply throttle settings of {name}: {error}"))?;
        self.wait_for_function_settled(function_name).await
    }

    /// Function mutations are asynchronous on the provider side; wait until
    /// the state and the last update settle before the next action.
    async fn wait_for_function_settled(&self, name: &str) -> Result<(), String> {
        for _ in 0..FUNCTION_SETTLE_POLLS {
            let output = self
                .lambda
                .get_function_configuration()
                .function_name(name)
                .send()
                .await
                .map_err(|error| format!("failed to poll state of {name}: {error}"))?;

            let settling = matches!(output.state(), Some(State::Pending))
                || matches!(output.last_update_status(), Some(LastUpdateStatus::InProgress));
            if !settling {
                if matches!(output.last_update_status(), Some(LastUpdateStatus::Failed)) {
                    return Err(format!(
                        "update of {name} failed: {}",
                        output
                            .last_update_status_reason()
                            .unwrap_or("no reason reported")
                    ));
                }
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(FUNCTION_SETTLE_INTERVAL_MS)).await;
        }
        Err(format!("function {name} did not settle in time"))
    }
}

fn sdk_environment(environment: &BTreeMap<String, String>) -> FunctionEnvironment {
    FunctionEnvironment::builder()
        .set_variables(Some(
            environment
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ))
        .build()
}

/// Match a live policy document against the postures this pipeline manages.
/// Anything unrecognized reads as the legacy posture and gets rewritten.
fn classify_policy(bucket: &str, policy: Option<&str>) -> PublicAccessMode {
    let Some(policy) = policy else {
        return PublicAccessMode::LegacyObjectAcl;
    };
    let Ok(document) = serde_json::from_str::<Value>(policy) else {
        return PublicAccessMode::LegacyObjectAcl;
    };
    for mode in [PublicAccessMode::TagGated, PublicAccessMode::BucketWide] {
        if bucket_policy_document(bucket, mode).as_ref() == Some(&document) {
            return mode;
        }
    }
    PublicAccessMode::LegacyObjectAcl
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env_string(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn pipeline_config_from_env() -> PipelineConfig {
    let defaults = PipelineConfig::default();
    PipelineConfig {
        environment: env_string("ENVIRONMENT").unwrap_or(defaults.environment),
        project_name: env_string("PROJECT_NAME").unwrap_or(defaults.project_name),
        timeout_seconds: env_parse("TIMEOUT_SECONDS", defaults.timeout_seconds),
        memory_mb: env_parse("MEMORY_MB", defaults.memory_mb),
        quota_per_day: env_parse("QUOTA_PER_DAY", defaults.quota_per_day),
        rate_limit: env_parse("RATE_LIMIT", defaults.rate_limit),
        burst_limit: env_parse("BURST_LIMIT", defaults.burst_limit),
    }
}

fn artifact_from_zip(zip_path: &str) -> Result<ArtifactSpec, String> {
    let bytes = std::fs::read(zip_path)
        .map_err(|error| format!("failed to read artifact {zip_path}: {error}"))?;
    Ok(ArtifactSpec {
        zip_path: zip_path.to_string(),
        source_hash: BASE64_STANDARD.encode(Sha256::digest(&bytes)),
    })
}

struct ProvisionArgs {
    zip_path: String,
    plan_only: bool,
}

fn parse_args() -> Result<ProvisionArgs, String> {
    let mut plan_only = false;
    let mut positional = Vec::new();
    for argument in std::env::args().skip(1) {
        match argument.as_str() {
            "--plan" => plan_only = true,
            other if other.starts_with("--") => return Err(format!("unknown flag {other}")),
            other => positional.push(other.to_string()),
        }
    }
    if positional.len() > 1 {
        return Err("expected at most one artifact path".to_string());
    }
    Ok(ProvisionArgs {
        zip_path: positional
            .pop()
            .unwrap_or_else(|| DEFAULT_ARTIFACT_PATH.to_string()),
        plan_only,
    })
}

async fn run() -> Result<(), String> {
    if let Some(level) = env_string("LOG_LEVEL").and_then(|value| LogLevel::parse(&value)) {
        logging::init(level);
    }
    let args = parse_args()?;
    let config = pipeline_config_from_env();
    let artifact = artifact_from_zip(&args.zip_path)?;
    let desired = desired_state_from(&config, &artifact);

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let region = aws_config
        .region()
        .map(|region| region.to_string())
        .unwrap_or_else(|| "us-east-1".to_string());
    let mut provisioner = AwsProvisioner {
        desired: desired.clone(),
        s3: aws_sdk_s3::Client::new(&aws_config),
        lambda: aws_sdk_lambda::Client::new(&aws_config),
        region,
    };

    if args.plan_only {
        let observed = provisioner.observe()?;
        let pending = plan(&desired, &observed);
        if pending.is_empty() {
            println!("deployment matches the desired state; nothing to do");
        } else {
            println!("planned actions ({}):", pending.len());
            for action in &pending.actions {
                println!("  {action}");
            }
        }
        return Ok(());
    }

    let started = Instant::now();
    let report = reconcile(&desired, &mut provisioner).map_err(|error| error.to_string())?;
    log_info(
        COMPONENT,
        "reconcile_completed",
        json!({
            "applied": report.applied.len(),
            "converged": report.converged,
            "duration_ms": started.elapsed().as_millis() as u64,
        }),
    );

    if report.changed() {
        println!("applied {} actions:", report.applied.len());
        for action in &report.applied {
            println!("  {action}");
        }
    } else {
        println!("deployment matches the desired state; nothing to do");
    }
    if !report.converged {
        return Err(
            "reconciliation applied its plan but the follow-up observation still drifts"
                .to_string(),
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        log_error(COMPONENT, "provision_failed", json!({ "error": error }));
        std::process::exit(1);
    }
}
