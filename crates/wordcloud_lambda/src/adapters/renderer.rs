use wordcloud_core::contract::NormalizedGenerationRequest;
use wordcloud_render::{render_word_cloud, RenderOptions};

use crate::handlers::generate::WordCloudRenderer;

/// Production renderer: the in-crate bitmap rasterizer.
pub struct BitmapRenderer;

impl WordCloudRenderer for BitmapRenderer {
    fn render(&self, request: &NormalizedGenerationRequest) -> Result<Vec<u8>, String> {
        let options = RenderOptions {
            width: request.width,
            height: request.height,
            ..RenderOptions::default()
        };
        render_word_cloud(&request.text, &options)
            .map(|image| image.png)
            .map_err(|error| error.to_string())
    }
}
