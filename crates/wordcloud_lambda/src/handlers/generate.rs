//! The compute unit: render the requested word cloud, persist it as a
//! publicly readable PNG, and answer with the object's URL. Responses here
//! are the wire contract the gateway proxies verbatim.

use std::time::Instant;

use serde_json::json;
use wordcloud_core::contract::{request_fingerprint, GenerationResult, NormalizedGenerationRequest};
use wordcloud_core::object_store::ObjectWriteOptions;
use wordcloud_core::storage_keys::{image_object_key, resolve_public_url};

use crate::adapters::object_store::ImageStore;
use crate::handlers::gateway::ComputeResponse;
use crate::logging::{log_error, log_info};

/// Rendering seam. The production implementation is
/// [`crate::adapters::renderer::BitmapRenderer`].
pub trait WordCloudRenderer {
    fn render(&self, request: &NormalizedGenerationRequest) -> Result<Vec<u8>, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
    pub bucket: String,
    pub key_prefix: String,
    /// Optional URL root overriding the default storage-host form.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateSuccess {
    pub object_key: String,
    pub image_url: String,
    pub image_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// The request reached compute with no text at all. Normally the
    /// gateway rejects this earlier; direct invocations still hit it.
    MissingText,
    Render(String),
    Store(String),
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingText => f.write_str("Text input is required"),
            Self::Render(message) | Self::Store(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for GenerateError {}

pub fn handle_generate_request(
    request: &NormalizedGenerationRequest,
    request_id: &str,
    config: &GenerateConfig,
    renderer: &dyn WordCloudRenderer,
    store: &dyn ImageStore,
) -> Result<GenerateSuccess, GenerateError> {
    let started_at = Instant::now();
    log_info(
        "generate_handler",
        "render_started",
        json!({
            "request_id": request_id,
            "text_chars": request.text.chars().count(),
            "width": request.width,
            "height": request.height,
            "request_fingerprint": request_fingerprint(request),
        }),
    );

    if request.text.is_empty() {
        return Err(GenerateError::MissingText);
    }

    let png = renderer
        .render(request)
        .map_err(|error| log_failure(request_id, started_at, GenerateError::Render(error)))?;

    let object_key = image_object_key(&config.key_prefix, request_id);
    store
        .put_image(&object_key, &png, &ObjectWriteOptions::public_png())
        .map_err(|error| {
            log_failure(
                request_id,
                started_at,
                GenerateError::Store(format!("Failed to persist image: {error}")),
            )
        })?;

    let image_url = resolve_public_url(
        &config.bucket,
        config.public_base_url.as_deref(),
        &object_key,
    );
    log_info(
        "generate_handler",
        "render_completed",
        json!({
            "request_id": request_id,
            "object_key": object_key,
            "image_bytes": png.len(),
            "duration_ms": started_at.elapsed().as_millis(),
        }),
    );

    Ok(GenerateSuccess {
        object_key,
        image_url,
        image_bytes: png.len(),
    })
}

fn log_failure(request_id: &str, started_at: Instant, error: GenerateError) -> GenerateError {
    log_error(
        "generate_handler",
        "render_failed",
        json!({
            "request_id": request_id,
            "duration_ms": started_at.elapsed().as_millis(),
            "error": error.to_string(),
        }),
    );
    error
}

/// Wire form of a compute outcome: `{"image_url": …}` on success,
/// `{"error": …}` on failure — 400 only for missing text, 500 otherwise.
pub fn compute_response(result: Result<GenerateSuccess, GenerateError>) -> ComputeResponse {
    match result {
        Ok(success) => ComputeResponse {
            status_code: 200,
            body: serde_json::to_string(&GenerationResult {
                image_url: success.image_url,
            })
            .expect("response payload should serialize"),
        },
        Err(error) => ComputeResponse {
            status_code: match error {
                GenerateError::MissingText => 400,
                _ => 500,
            },
            body: json!({"error": error.to_string()}).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use wordcloud_core::contract::{normalize_request, GenerationRequest};

    struct RecordingStore {
        writes: Mutex<HashMap<String, (Vec<u8>, ObjectWriteOptions)>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                writes: Mutex::new(HashMap::new()),
            }
        }

        fn keys(&self) -> Vec<String> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .keys()
                .cloned()
                .collect()
        }

        fn write(&self, key: &str) -> Option<(Vec<u8>, ObjectWriteOptions)> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .get(key)
                .cloned()
        }
    }

    impl ImageStore for RecordingStore {
        fn put_image(
            &self,
            key: &str,
            body: &[u8],
            options: &ObjectWriteOptions,
        ) -> Result<(), String> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .insert(key.to_string(), (body.to_vec(), options.clone()));
            Ok(())
        }
    }

    struct DenyingStore;

    impl ImageStore for DenyingStore {
        fn put_image(&self, key: &str, _: &[u8], _: &ObjectWriteOptions) -> Result<(), String> {
            Err(format!("simulated write failure for key: {key}"))
        }
    }

    struct FixedRenderer;

    impl WordCloudRenderer for FixedRenderer {
        fn render(&self, _: &NormalizedGenerationRequest) -> Result<Vec<u8>, String> {
            Ok(b"png-bytes".to_vec())
        }
    }

    struct FailingRenderer;

    impl WordCloudRenderer for FailingRenderer {
        fn render(&self, _: &NormalizedGenerationRequest) -> Result<Vec<u8>, String> {
            Err("need at least 1 word to render a word cloud, got 0".to_string())
        }
    }

    fn request(text: &str) -> NormalizedGenerationRequest {
        normalize_request(GenerationRequest {
            text: text.to_string(),
            options: None,
        })
        .expect("request should normalize")
    }

    fn config() -> GenerateConfig {
        GenerateConfig {
            bucket: "wordcloud-generator-images-dev".to_string(),
            key_prefix: "wordclouds".to_string(),
            public_base_url: None,
        }
    }

    #[test]
    fn success_writes_public_png_under_the_request_key() {
        let store = RecordingStore::new();
        let success = handle_generate_request(
            &request("hello clouds"),
            "req-1",
            &config(),
            &FixedRenderer,
            &store,
        )
        .expect("generate should succeed");

        assert_eq!(success.object_key, "wordclouds/wordcloud_req-1.png");
        assert_eq!(
            success.image_url,
            "https://wordcloud-generator-images-dev.s3.amazonaws.com/wordclouds/wordcloud_req-1.png"
        );
        assert_eq!(store.keys(), vec!["wordclouds/wordcloud_req-1.png"]);

        let (body, options) = store
            .write("wordclouds/wordcloud_req-1.png")
            .expect("write should be recorded");
        assert_eq!(body, b"png-bytes");
        assert!(options.public_read);
        assert_eq!(options.content_type, "image/png");
    }

    #[test]
    fn base_url_override_replaces_the_storage_host() {
        let store = RecordingStore::new();
        let mut config = config();
        config.public_base_url = Some("https://cdn.example.com".to_string());

        let success = handle_generate_request(
            &request("hello"),
            "req-2",
            &config,
            &FixedRenderer,
            &store,
        )
        .expect("generate should succeed");

        assert_eq!(
            success.image_url,
            "https://cdn.example.com/wordclouds/wordcloud_req-2.png"
        );
    }

    #[test]
    fn empty_text_maps_to_the_required_input_response() {
        let empty = NormalizedGenerationRequest {
            text: String::new(),
            width: 800,
            height: 400,
        };
        let result = handle_generate_request(
            &empty,
            "req-3",
            &config(),
            &FixedRenderer,
            &RecordingStore::new(),
        );

        assert_eq!(result, Err(GenerateError::MissingText));
        let response = compute_response(result);
        assert_eq!(response.status_code, 400);
        assert_eq!(response.body, r#"{"error":"Text input is required"}"#);
    }

    #[test]
    fn renderer_failure_becomes_a_server_error_with_the_reason() {
        let result = handle_generate_request(
            &request("the and of"),
            "req-4",
            &config(),
            &FailingRenderer,
            &RecordingStore::new(),
        );

        let response = compute_response(result);
        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.body,
            r#"{"error":"need at least 1 word to render a word cloud, got 0"}"#
        );
    }

    #[test]
    fn store_failure_becomes_a_server_error() {
        let result = handle_generate_request(
            &request("hello"),
            "req-5",
            &config(),
            &FixedRenderer,
            &DenyingStore,
        );

        match &result {
            Err(GenerateError::Store(message)) => {
                assert!(message.contains("Failed to persist image"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(compute_response(result).status_code, 500);
    }

    #[test]
    fn success_body_is_the_image_url_envelope() {
        let store = RecordingStore::new();
        let result = handle_generate_request(
            &request("hello"),
            "req-6",
            &config(),
            &FixedRenderer,
            &store,
        );

        let response = compute_response(result);
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.body,
            r#"{"image_url":"https://wordcloud-generator-images-dev.s3.amazonaws.com/wordclouds/wordcloud_req-6.png"}"#
        );
    }
}
