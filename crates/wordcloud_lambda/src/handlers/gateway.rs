//! The HTTP edge: method routing, CORS preflight, throttling, and the
//! fail-fast validation gate. Requests that survive all of it reach the
//! compute seam, whose response is proxied back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wordcloud_core::contract::{normalize_request, GenerationRequest, NormalizedGenerationRequest};
use wordcloud_core::throttle::ThrottleDecision;

use crate::logging::{log_debug, log_info};

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "OPTIONS,POST";
pub const CORS_ALLOW_HEADERS: &str =
    "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// Raw compute-unit response. The gateway never rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeResponse {
    pub status_code: u16,
    pub body: String,
}

/// Compute seam behind the gateway.
pub trait GenerateService {
    fn generate(&self, request: &NormalizedGenerationRequest) -> ComputeResponse;
}

/// Throttle seam; implementations own their clock.
pub trait RequestGate {
    fn admit(&self) -> ThrottleDecision;
}

pub fn handle_http_event(
    event: Value,
    gate: &dyn RequestGate,
    service: &dyn GenerateService,
) -> ApiGatewayResponse {
    let method = event
        .get("httpMethod")
        .and_then(Value::as_str)
        .unwrap_or("POST")
        .to_ascii_uppercase();

    if method == "OPTIONS" {
        return preflight_response();
    }
    if method != "POST" {
        return error_response(
            405,
            json!({
                "error": "method_not_allowed",
                "message": format!("Unsupported method: {method}"),
            }),
        );
    }

    match gate.admit() {
        ThrottleDecision::Admitted => {}
        ThrottleDecision::RateLimited => {
            log_info("gateway", "request_throttled", json!({"reason": "rate"}));
            return throttled_response("request rate limit exceeded");
        }
        ThrottleDecision::QuotaExhausted => {
            log_info("gateway", "request_throttled", json!({"reason": "quota"}));
            return throttled_response("daily request quota exhausted");
        }
    }

    let payload = match normalize_apigw_event(event) {
        Ok(value) => value,
        Err(message) => return validation_error_response(&message),
    };

    let request = match serde_json::from_value::<GenerationRequest>(payload) {
        Ok(value) => value,
        Err(error) => return validation_error_response(&format!("Malformed request: {error}")),
    };

    let normalized = match normalize_request(request) {
        Ok(value) => value,
        Err(error) => return validation_error_response(error.message()),
    };

    let compute = service.generate(&normalized);
    log_debug(
        "gateway",
        "compute_proxied",
        json!({"status_code": compute.status_code}),
    );
    ApiGatewayResponse {
        status_code: compute.status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: compute.body,
    }
}

/// Unwrap the REST-proxy envelope: a `body` member may be an embedded
/// object (console test events), a JSON string (real proxy traffic), or
/// null. Events without a `body` member are direct invocations and are
/// taken whole.
fn normalize_apigw_event(event: Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}

fn preflight_response() -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 200,
        headers: json!({
            "Access-Control-Allow-Origin": CORS_ALLOW_ORIGIN,
            "Access-Control-Allow-Methods": CORS_ALLOW_METHODS,
            "Access-Control-Allow-Headers": CORS_ALLOW_HEADERS,
        }),
        body: String::new(),
    }
}

fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(
        400,
        json!({
            "error": "validation_error",
            "message": message,
        }),
    )
}

fn throttled_response(message: &str) -> ApiGatewayResponse {
    error_response(
        429,
        json!({
            "error": "throttled",
            "message": message,
        }),
    )
}

fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: json!({"Content-Type": "application/json"}),
        body: payload.to_string(),
    }
}
