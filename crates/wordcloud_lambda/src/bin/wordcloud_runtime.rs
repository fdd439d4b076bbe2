use std::str::FromStr;
use std::sync::{Mutex, OnceLock, PoisonError};

use aws_sdk_s3::primitives::ByteStream;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use wordcloud_core::contract::NormalizedGenerationRequest;
use wordcloud_core::object_store::{ObjectWriteOptions, PUBLIC_READ_TAG_KEY, PUBLIC_READ_TAG_VALUE};
use wordcloud_core::storage_keys::DEFAULT_KEY_PREFIX;
use wordcloud_core::throttle::{GatewayThrottle, ThrottleConfig, ThrottleDecision};
use wordcloud_lambda::adapters::object_store::ImageStore;
use wordcloud_lambda::adapters::renderer::BitmapRenderer;
use wordcloud_lambda::handlers::gateway::{
    handle_http_event, ApiGatewayResponse, ComputeResponse, GenerateService, RequestGate,
};
use wordcloud_lambda::handlers::generate::{
    compute_response, handle_generate_request, GenerateConfig,
};
use wordcloud_lambda::logging::{self, LogLevel};

struct S3ImageStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl ImageStore for S3ImageStore {
    fn put_image(
        &self,
        key: &str,
        body: &[u8],
        options: &ObjectWriteOptions,
    ) -> Result<(), String> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let content_type = options.content_type.clone();
        let tagging = options
            .public_read
            .then(|| format!("{PUBLIC_READ_TAG_KEY}={PUBLIC_READ_TAG_VALUE}"));
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let mut request = client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .content_type(content_type)
                    .body(ByteStream::from(body_bytes));
                if let Some(tagging) = tagging {
                    request = request.tagging(tagging);
                }
                request
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to write image to s3: {error}"))
            })
        })
    }
}

// One throttle per process: warm invocations share it, so tokens and the
// daily count carry across events the same way a gateway usage plan would.
static THROTTLE: OnceLock<Mutex<GatewayThrottle>> = OnceLock::new();

struct ProcessGate {
    config: ThrottleConfig,
}

impl RequestGate for ProcessGate {
    fn admit(&self) -> ThrottleDecision {
        let now_ms = epoch_ms();
        THROTTLE
            .get_or_init(|| Mutex::new(GatewayThrottle::new(self.config, now_ms)))
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(now_ms)
    }
}

fn epoch_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

struct RuntimeService {
    config: GenerateConfig,
    store: S3ImageStore,
    request_id: String,
}

impl GenerateService for RuntimeService {
    fn generate(&self, request: &NormalizedGenerationRequest) -> ComputeResponse {
        compute_response(handle_generate_request(
            request,
            &self.request_id,
            &self.config,
            &BitmapRenderer,
            &self.store,
        ))
    }
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

fn throttle_config_from_env() -> ThrottleConfig {
    let defaults = ThrottleConfig::default();
    ThrottleConfig {
        quota_per_day: env_parse("QUOTA_PER_DAY", defaults.quota_per_day),
        rate_limit: env_parse("RATE_LIMIT", defaults.rate_limit),
        burst_limit: env_parse("BURST_LIMIT", defaults.burst_limit),
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<ApiGatewayResponse, Error> {
    if let Some(level) = env_string("LOG_LEVEL").and_then(|value| LogLevel::parse(&value)) {
        logging::init(level);
    }

    let bucket =
        std::env::var("BUCKET_NAME").map_err(|_| Error::from("BUCKET_NAME must be configured"))?;
    let config = GenerateConfig {
        bucket: bucket.clone(),
        key_prefix: env_string("KEY_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
        public_base_url: env_string("PUBLIC_BASE_URL"),
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3ImageStore {
        bucket,
        s3_client: aws_sdk_s3::Client::new(&aws_config),
    };

    let gate = ProcessGate {
        config: throttle_config_from_env(),
    };
    let service = RuntimeService {
        config,
        store,
        request_id: event.context.request_id.clone(),
    };

    Ok(handle_http_event(event.payload, &gate, &service))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_request)).await
}
