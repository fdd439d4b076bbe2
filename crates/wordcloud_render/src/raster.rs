//! Layout → pixels → PNG. Drawing writes straight into a raw RGBA buffer;
//! encoding goes through the `image` crate.

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::font::{self, GLYPH_SPACING, GLYPH_WIDTH};
use crate::layout::{Layout, PlacedWord};
use crate::RenderError;

const BYTES_PER_PIXEL: usize = 4;

pub const BACKGROUND: [u8; 4] = [255, 255, 255, 255];

/// Word colors, cycled by placement order. Picked to stay readable on the
/// white background.
pub const PALETTE: [[u8; 4]; 8] = [
    [31, 119, 180, 255],
    [255, 127, 14, 255],
    [44, 160, 44, 255],
    [214, 39, 40, 255],
    [148, 103, 189, 255],
    [140, 86, 75, 255],
    [227, 119, 194, 255],
    [23, 190, 207, 255],
];

/// Paint the layout onto a fresh RGBA canvas.
pub fn rasterize(layout: &Layout) -> Vec<u8> {
    let mut pixels = vec![0u8; layout.width as usize * layout.height as usize * BYTES_PER_PIXEL];
    for pixel in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
        pixel.copy_from_slice(&BACKGROUND);
    }

    for word in &layout.words {
        draw_word(&mut pixels, layout.width, word);
    }
    pixels
}

fn draw_word(pixels: &mut [u8], canvas_width: u32, word: &PlacedWord) {
    let color = PALETTE[word.color_index % PALETTE.len()];
    let mut pen_x = word.x;

    for c in word.word.chars() {
        let Some(rows) = font::glyph(c) else {
            continue;
        };
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    fill_block(
                        pixels,
                        canvas_width,
                        pen_x + col * word.scale,
                        word.y + row as u32 * word.scale,
                        word.scale,
                        color,
                    );
                }
            }
        }
        pen_x += (GLYPH_WIDTH + GLYPH_SPACING) * word.scale;
    }
}

fn fill_block(pixels: &mut [u8], canvas_width: u32, x: u32, y: u32, size: u32, color: [u8; 4]) {
    for row in y..y + size {
        for col in x..x + size {
            let index = (row as usize * canvas_width as usize + col as usize) * BYTES_PER_PIXEL;
            pixels[index..index + BYTES_PER_PIXEL].copy_from_slice(&color);
        }
    }
}

pub fn encode_png(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let rgba = RgbaImage::from_raw(width, height, pixels.to_vec())
        .ok_or_else(|| RenderError::Encode("pixel buffer does not match dimensions".to_string()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgba8(rgba)
        .write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|err| RenderError::Encode(err.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::lay_out_words;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn pixel_at(pixels: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let index = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            pixels[index],
            pixels[index + 1],
            pixels[index + 2],
            pixels[index + 3],
        ]
    }

    #[test]
    fn empty_layout_rasterizes_to_plain_background() {
        let layout = lay_out_words(&[], 16, 8);
        let pixels = rasterize(&layout);
        assert_eq!(pixels.len(), 16 * 8 * BYTES_PER_PIXEL);
        for x in 0..16 {
            for y in 0..8 {
                assert_eq!(pixel_at(&pixels, 16, x, y), BACKGROUND);
            }
        }
    }

    #[test]
    fn placed_words_leave_colored_pixels() {
        let layout = lay_out_words(&[("ink".to_string(), 3)], 200, 100);
        let word = layout.words.first().expect("word should place");
        let pixels = rasterize(&layout);

        let colored = (word.y..word.y + word.height)
            .flat_map(|y| (word.x..word.x + word.width).map(move |x| (x, y)))
            .filter(|(x, y)| pixel_at(&pixels, 200, *x, *y) != BACKGROUND)
            .count();
        assert!(colored > 0, "word box should contain ink");
    }

    #[test]
    fn ink_never_escapes_the_word_box() {
        let layout = lay_out_words(&[("edge".to_string(), 2)], 120, 60);
        let word = layout.words.first().expect("word should place");
        let pixels = rasterize(&layout);

        for y in 0..60u32 {
            for x in 0..120u32 {
                let inside = x >= word.x
                    && x < word.x + word.width
                    && y >= word.y
                    && y < word.y + word.height;
                if !inside {
                    assert_eq!(pixel_at(&pixels, 120, x, y), BACKGROUND, "ink at ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn encode_png_emits_the_png_signature() {
        let layout = lay_out_words(&[("png".to_string(), 1)], 64, 32);
        let pixels = rasterize(&layout);
        let png = encode_png(&pixels, 64, 32).expect("encode should succeed");
        assert_eq!(&png[..8], &PNG_MAGIC);
    }

    #[test]
    fn encode_png_rejects_mismatched_buffer() {
        let err = encode_png(&[0u8; 12], 64, 32).expect_err("should reject");
        assert!(matches!(err, RenderError::Encode(_)));
    }
}
