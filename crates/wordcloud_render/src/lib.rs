//! Word-cloud rendering: weighted vocabulary extraction, spiral layout on a
//! white canvas, and PNG encoding. Pure and deterministic, with no I/O and
//! no platform dependencies, so the same crate serves the Lambda runtime,
//! local tooling, and tests.

pub mod font;
pub mod layout;
pub mod raster;
pub mod tokenize;

pub const DEFAULT_CANVAS_WIDTH: u32 = 800;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 400;
/// Heaviest-N cutoff applied to the vocabulary before layout.
pub const DEFAULT_MAX_WORDS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub max_words: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Nothing survived tokenization and filtering, or nothing fit the
    /// canvas.
    EmptyVocabulary,
    InvalidDimensions { width: u32, height: u32 },
    Encode(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyVocabulary => {
                f.write_str("need at least 1 word to render a word cloud, got 0")
            }
            Self::InvalidDimensions { width, height } => {
                write!(f, "canvas dimensions {width}x{height} are unusable")
            }
            Self::Encode(message) => write!(f, "png encoding failed: {message}"),
        }
    }
}

impl std::error::Error for RenderError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub word_count: usize,
}

/// Full pipeline: text → frequencies → layout → pixels → PNG bytes.
pub fn render_word_cloud(
    text: &str,
    options: &RenderOptions,
) -> Result<RenderedImage, RenderError> {
    if options.width == 0 || options.height == 0 {
        return Err(RenderError::InvalidDimensions {
            width: options.width,
            height: options.height,
        });
    }

    let frequencies = tokenize::term_frequencies(text, options.max_words);
    if frequencies.is_empty() {
        return Err(RenderError::EmptyVocabulary);
    }

    let layout = layout::lay_out_words(&frequencies, options.width, options.height);
    if layout.words.is_empty() {
        return Err(RenderError::EmptyVocabulary);
    }

    let pixels = raster::rasterize(&layout);
    let png = raster::encode_png(&pixels, options.width, options.height)?;
    Ok(RenderedImage {
        png,
        width: options.width,
        height: options.height,
        word_count: layout.words.len(),
    })
}
