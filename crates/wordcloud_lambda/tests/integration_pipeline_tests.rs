use std::collections::HashSet;

use serde_json::{json, Value};
use wordcloud_core::config::PipelineConfig;
use wordcloud_core::object_store::ObjectWriteOptions;
use wordcloud_core::{ONE_DAY_MS, ONE_SEC_MS};
use wordcloud_lambda::handlers::gateway::ApiGatewayResponse;
use wordcloud_lambda::pipeline::LocalPipeline;

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn post_event(payload: Value) -> Value {
    json!({
        "httpMethod": "POST",
        "path": "/generate",
        "headers": { "Content-Type": "application/json" },
        "body": payload.to_string(),
    })
}

fn generate(pipeline: &LocalPipeline, text: &str) -> ApiGatewayResponse {
    pipeline.handle(post_event(json!({ "text": text })))
}

fn body_json(response: &ApiGatewayResponse) -> Value {
    serde_json::from_str(&response.body).expect("response body should be json")
}

fn image_url(response: &ApiGatewayResponse) -> String {
    body_json(response)["image_url"]
        .as_str()
        .expect("success body should carry image_url")
        .to_string()
}

fn object_key_of(url: &str) -> String {
    url.split(".amazonaws.com/")
        .nth(1)
        .expect("url should address the bucket host")
        .to_string()
}

#[test]
fn generates_a_cloud_and_serves_it_anonymously() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());

    let response = generate(&pipeline, "hello world hello serverless word cloud");
    assert_eq!(response.status_code, 200);

    let url = image_url(&response);
    assert!(
        url.starts_with(
            "https://wordcloud-generator-images-dev.s3.amazonaws.com/wordclouds/wordcloud_"
        ),
        "unexpected url: {url}"
    );
    assert!(url.ends_with(".png"));

    let key = object_key_of(&url);
    assert_eq!(pipeline.current_keys(), vec![key.clone()]);

    let version = pipeline
        .read_anonymous(&key)
        .expect("tagged object should be readable without credentials");
    assert!(version.public_read);
    assert!(version.encrypted);
    assert_eq!(version.content_type, "image/png");
    assert_eq!(&version.body[..8], &PNG_MAGIC);
}

#[test]
fn oversized_text_is_rejected_before_compute() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());
    let oversized = "word ".repeat(2_001);

    let response = pipeline.handle(post_event(json!({ "text": oversized })));

    assert_eq!(response.status_code, 400);
    let body = body_json(&response);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "text exceeds 10000 characters (10005)");
    assert!(pipeline.current_keys().is_empty());
}

#[test]
fn out_of_range_dimensions_are_rejected() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());

    let response = pipeline.handle(post_event(
        json!({ "text": "hello world", "options": { "width": 50 } }),
    ));

    assert_eq!(response.status_code, 400);
    assert_eq!(
        body_json(&response)["message"],
        "width must be between 100 and 2000, got 50"
    );
    assert!(pipeline.current_keys().is_empty());
}

#[test]
fn empty_text_is_rejected_at_the_gateway() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());

    let response = generate(&pipeline, "");

    assert_eq!(response.status_code, 400);
    assert_eq!(body_json(&response)["message"], "text must not be empty");
    assert!(pipeline.current_keys().is_empty());
}

#[test]
fn preflight_serves_cors_headers_without_generating() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());

    let response = pipeline.handle(json!({ "httpMethod": "OPTIONS" }));

    assert_eq!(response.status_code, 200);
    assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
    assert_eq!(response.headers["Access-Control-Allow-Methods"], "OPTIONS,POST");
    assert!(response.headers["Access-Control-Allow-Headers"]
        .as_str()
        .expect("allow-headers should be a string")
        .contains("Content-Type"));
    assert!(pipeline.current_keys().is_empty());
}

#[test]
fn unsupported_methods_get_405() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());

    let response = pipeline.handle(json!({ "httpMethod": "GET" }));

    assert_eq!(response.status_code, 405);
    assert_eq!(body_json(&response)["error"], "method_not_allowed");
}

#[test]
fn concurrent_requests_store_distinct_objects() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());

    let urls: Vec<String> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let response = generate(&pipeline, "alpha beta gamma delta epsilon");
                    assert_eq!(response.status_code, 200);
                    image_url(&response)
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker panicked"))
            .collect()
    });

    let unique: HashSet<&String> = urls.iter().collect();
    assert_eq!(unique.len(), 4, "every request should get its own object");
    assert_eq!(pipeline.current_keys().len(), 4);
}

#[test]
fn superseded_versions_expire_after_the_retention_window() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());
    let bucket = pipeline.bucket();
    {
        let mut bucket = bucket.lock().expect("poisoned mutex");
        bucket.put_object(
            "wordclouds/steady.png",
            b"version-one",
            &ObjectWriteOptions::public_png(),
            0,
        );
        bucket.put_object(
            "wordclouds/steady.png",
            b"version-two",
            &ObjectWriteOptions::public_png(),
            ONE_SEC_MS,
        );
        assert_eq!(bucket.version_count("wordclouds/steady.png"), 2);
        assert_eq!(bucket.noncurrent_version_count("wordclouds/steady.png"), 1);
    }

    pipeline.advance_clock(31 * ONE_DAY_MS);
    let removed = pipeline.run_lifecycle();
    assert_eq!(removed, 1);

    {
        let bucket = bucket.lock().expect("poisoned mutex");
        assert_eq!(bucket.version_count("wordclouds/steady.png"), 1);
    }
    let version = pipeline
        .read_anonymous("wordclouds/steady.png")
        .expect("current version should survive expiry");
    assert_eq!(version.body, b"version-two");
}

#[test]
fn burst_capacity_gates_back_to_back_requests() {
    let config = PipelineConfig::default()
        .with_rate_limit(1.0)
        .with_burst_limit(3);
    let pipeline = LocalPipeline::new(&config);

    for _ in 0..3 {
        assert_eq!(generate(&pipeline, "steady words here").status_code, 200);
    }
    let response = generate(&pipeline, "steady words here");
    assert_eq!(response.status_code, 429);
    assert_eq!(
        body_json(&response)["message"],
        "request rate limit exceeded"
    );
    assert_eq!(pipeline.current_keys().len(), 3);

    // Two seconds at one token per second buys another request.
    pipeline.advance_clock(2 * ONE_SEC_MS);
    assert_eq!(generate(&pipeline, "steady words here").status_code, 200);
}

#[test]
fn daily_quota_resets_at_the_day_boundary() {
    let config = PipelineConfig::default().with_quota_per_day(2);
    let pipeline = LocalPipeline::new(&config);

    assert_eq!(generate(&pipeline, "first request words").status_code, 200);
    assert_eq!(generate(&pipeline, "second request words").status_code, 200);

    let response = generate(&pipeline, "third request words");
    assert_eq!(response.status_code, 429);
    assert_eq!(
        body_json(&response)["message"],
        "daily request quota exhausted"
    );
    assert_eq!(pipeline.quota_used_today(), 2);

    pipeline.advance_clock(ONE_DAY_MS);
    assert_eq!(generate(&pipeline, "next day words").status_code, 200);
    assert_eq!(pipeline.quota_used_today(), 1);
}

#[test]
fn blank_text_passes_the_gateway_and_fails_in_render() {
    let pipeline = LocalPipeline::new(&PipelineConfig::default());

    let response = generate(&pipeline, "   ");

    assert_eq!(response.status_code, 500);
    assert!(
        response.body.contains("need at least 1 word"),
        "unexpected body: {}",
        response.body
    );
    assert!(pipeline.current_keys().is_empty());
}
