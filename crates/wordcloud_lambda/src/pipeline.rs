//! The whole pipeline wired in-process: gateway → throttle → compute →
//! in-memory bucket model. Time is caller-supplied, so end-to-end behavior
//! (throttling windows, lifecycle expiry) is exercised deterministically in
//! tests and local tooling without any cloud dependency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use uuid::Uuid;
use wordcloud_core::config::PipelineConfig;
use wordcloud_core::contract::NormalizedGenerationRequest;
use wordcloud_core::object_store::{
    BucketModel, BucketSettings, ObjectVersion, ObjectWriteOptions, ReadError,
};
use wordcloud_core::storage_keys::DEFAULT_KEY_PREFIX;
use wordcloud_core::throttle::{GatewayThrottle, ThrottleDecision};

use crate::adapters::object_store::ImageStore;
use crate::adapters::renderer::BitmapRenderer;
use crate::handlers::gateway::{
    handle_http_event, ApiGatewayResponse, ComputeResponse, GenerateService, RequestGate,
};
use crate::handlers::generate::{compute_response, handle_generate_request, GenerateConfig};

/// [`ImageStore`] over the in-memory bucket model, writing at a fixed
/// timestamp.
pub struct SharedBucketStore {
    bucket: Arc<Mutex<BucketModel>>,
    now_ms: u64,
}

impl ImageStore for SharedBucketStore {
    fn put_image(
        &self,
        key: &str,
        body: &[u8],
        options: &ObjectWriteOptions,
    ) -> Result<(), String> {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put_object(key, body, options, self.now_ms);
        Ok(())
    }
}

pub struct LocalPipeline {
    bucket: Arc<Mutex<BucketModel>>,
    throttle: Mutex<GatewayThrottle>,
    now_ms: AtomicU64,
    generate_config: GenerateConfig,
}

impl LocalPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        let bucket_name = config.bucket_name();
        Self {
            bucket: Arc::new(Mutex::new(BucketModel::new(
                &bucket_name,
                BucketSettings::strict(),
            ))),
            throttle: Mutex::new(GatewayThrottle::new(config.throttle(), 0)),
            now_ms: AtomicU64::new(0),
            generate_config: GenerateConfig {
                bucket: bucket_name,
                key_prefix: DEFAULT_KEY_PREFIX.to_string(),
                public_base_url: None,
            },
        }
    }

    /// Move the pipeline clock. Requests and lifecycle sweeps observe the
    /// most recent value.
    pub fn advance_clock(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    /// Feed one gateway event through the full stack.
    pub fn handle(&self, event: Value) -> ApiGatewayResponse {
        handle_http_event(
            event,
            &PipelineGate { pipeline: self },
            &PipelineService { pipeline: self },
        )
    }

    /// Shared handle onto the underlying bucket model.
    pub fn bucket(&self) -> Arc<Mutex<BucketModel>> {
        Arc::clone(&self.bucket)
    }

    pub fn read_anonymous(&self, key: &str) -> Result<ObjectVersion, ReadError> {
        self.lock_bucket().read_anonymous(key).cloned()
    }

    pub fn current_keys(&self) -> Vec<String> {
        self.lock_bucket().list_current_keys("")
    }

    /// Run the provider's lifecycle sweep at the pipeline clock.
    pub fn run_lifecycle(&self) -> usize {
        let now_ms = self.now_ms();
        self.lock_bucket().apply_lifecycle(now_ms)
    }

    pub fn quota_used_today(&self) -> u64 {
        self.throttle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .quota_used_today()
    }

    fn lock_bucket(&self) -> MutexGuard<'_, BucketModel> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct PipelineGate<'a> {
    pipeline: &'a LocalPipeline,
}

impl RequestGate for PipelineGate<'_> {
    fn admit(&self) -> ThrottleDecision {
        self.pipeline
            .throttle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(self.pipeline.now_ms())
    }
}

struct PipelineService<'a> {
    pipeline: &'a LocalPipeline,
}

impl GenerateService for PipelineService<'_> {
    fn generate(&self, request: &NormalizedGenerationRequest) -> ComputeResponse {
        let request_id = Uuid::new_v4().to_string();
        let store = SharedBucketStore {
            bucket: Arc::clone(&self.pipeline.bucket),
            now_ms: self.pipeline.now_ms(),
        };
        compute_response(handle_generate_request(
            request,
            &request_id,
            &self.pipeline.generate_config,
            &BitmapRenderer,
            &store,
        ))
    }
}
