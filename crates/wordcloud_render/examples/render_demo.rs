//! Render a sample word cloud and write it to demo_wordcloud.png.
//!
//! Run with: cargo run -p wordcloud_render --example render_demo

use wordcloud_render::{render_word_cloud, RenderOptions};

const SAMPLE_TEXT: &str = "\
    The quick brown fox jumps over the lazy dog while the dog naps in the \
    sun. Word clouds weight each word by how often it appears, so repeated \
    words like fox fox fox and dog dog grow larger than words mentioned \
    once. Rendering happens on a fixed canvas with a spiral search for \
    free space, which keeps the output deterministic for identical input.";

const OUTPUT_PATH: &str = "demo_wordcloud.png";

fn main() {
    let options = RenderOptions::default();
    let image = render_word_cloud(SAMPLE_TEXT, &options).expect("sample text should render");

    std::fs::write(OUTPUT_PATH, &image.png).expect("failed to write demo png");

    println!(
        "--- Render demo ({}x{} canvas) ---",
        image.width, image.height
    );
    println!("Words placed: {}", image.word_count);
    println!("PNG bytes: {}", image.png.len());
    println!("Written to: {OUTPUT_PATH}");
}
