use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bounds enforced by the gateway's fail-fast validation gate.
pub const MIN_TEXT_CHARS: usize = 1;
pub const MAX_TEXT_CHARS: usize = 10_000;
pub const MIN_IMAGE_DIMENSION: u32 = 100;
pub const MAX_IMAGE_DIMENSION: u32 = 2_000;

/// Canvas defaults when the caller omits options.
pub const DEFAULT_IMAGE_WIDTH: u32 = 800;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 400;

/// Raw `POST /generate` body as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ImageOptions>,
}

/// Optional rendering dimensions; each bounded to [100, 2000] when present.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Request that passed the validation gate, with dimensions resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedGenerationRequest {
    pub text: String,
    pub width: u32,
    pub height: u32,
}

/// Success body returned to the caller: the stored object's public URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationResult {
    pub image_url: String,
}

/// Error body shape emitted by the compute unit, `{"error": "<message>"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Fail-fast validation gate. Character counts are Unicode scalar counts and
/// the text is not trimmed: whitespace-only input passes here and surfaces
/// later as a rendering failure in the compute unit.
pub fn normalize_request(
    payload: GenerationRequest,
) -> Result<NormalizedGenerationRequest, ValidationError> {
    let char_count = payload.text.chars().count();
    if char_count < MIN_TEXT_CHARS {
        return Err(ValidationError::new("text must not be empty"));
    }
    if char_count > MAX_TEXT_CHARS {
        return Err(ValidationError::new(format!(
            "text exceeds {MAX_TEXT_CHARS} characters ({char_count})"
        )));
    }

    let options = payload.options.unwrap_or_default();
    let width = resolve_dimension("width", options.width, DEFAULT_IMAGE_WIDTH)?;
    let height = resolve_dimension("height", options.height, DEFAULT_IMAGE_HEIGHT)?;

    Ok(NormalizedGenerationRequest {
        text: payload.text,
        width,
        height,
    })
}

fn resolve_dimension(
    name: &str,
    value: Option<u32>,
    default: u32,
) -> Result<u32, ValidationError> {
    let Some(value) = value else {
        return Ok(default);
    };
    if !(MIN_IMAGE_DIMENSION..=MAX_IMAGE_DIMENSION).contains(&value) {
        return Err(ValidationError::new(format!(
            "{name} must be between {MIN_IMAGE_DIMENSION} and {MAX_IMAGE_DIMENSION}, got {value}"
        )));
    }
    Ok(value)
}

/// SHA-256 over the canonical JSON of the normalized request, for log
/// correlation across the gateway and compute unit.
pub fn request_fingerprint(request: &NormalizedGenerationRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(request));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
