//! Frequency-weighted placement. Words are scaled by the square root of
//! their relative count and placed along an outward spiral from the canvas
//! center, first word dead center. A pixel occupancy grid keeps bounding
//! boxes (plus a one-pixel margin) disjoint. Placement is deterministic:
//! identical frequencies yield identical layouts.

use crate::font;

/// Margin kept free around every placed word, in pixels.
const PADDING: u32 = 1;
/// Hard cap on the integer glyph scale of the heaviest word.
const MAX_WORD_SCALE: u32 = 12;
/// Spiral step in radians and growth in pixels per radian.
const SPIRAL_STEP: f64 = 0.35;
const SPIRAL_GROWTH: f64 = 1.8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedWord {
    pub word: String,
    pub count: u32,
    pub scale: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Stable per-placement index for color assignment downstream.
    pub color_index: usize,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub words: Vec<PlacedWord>,
}

/// Scale cap for the heaviest word on a canvas of this height.
fn top_scale(height: u32) -> u32 {
    (height / 40).clamp(1, MAX_WORD_SCALE)
}

fn scale_for(count: u32, max_count: u32, top: u32) -> u32 {
    let ratio = (f64::from(count) / f64::from(max_count)).sqrt();
    ((f64::from(top) * ratio).round() as u32).max(1)
}

struct Occupancy {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl Occupancy {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; (width as usize) * (height as usize)],
        }
    }

    fn is_free(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        for row in y..y + h {
            let base = (row as usize) * (self.width as usize);
            for col in x..x + w {
                if self.cells[base + col as usize] {
                    return false;
                }
            }
        }
        true
    }

    fn mark(&mut self, x: u32, y: u32, w: u32, h: u32) {
        for row in y..y + h {
            let base = (row as usize) * (self.width as usize);
            for col in x..x + w {
                self.cells[base + col as usize] = true;
            }
        }
    }

    /// Walk the spiral until a free spot for a `w`×`h` box appears, or the
    /// spiral leaves the canvas for good.
    fn find_spot(&self, w: u32, h: u32) -> Option<(u32, u32)> {
        let cx = f64::from(self.width) / 2.0;
        let cy = f64::from(self.height) / 2.0;
        let max_radius = (cx * cx + cy * cy).sqrt() + f64::from(w.max(h));

        let mut theta = 0.0_f64;
        loop {
            let radius = SPIRAL_GROWTH * theta;
            if radius > max_radius {
                return None;
            }
            let x = (cx + radius * theta.cos() - f64::from(w) / 2.0).floor() as i64;
            let y = (cy + radius * theta.sin() - f64::from(h) / 2.0).floor() as i64;
            theta += SPIRAL_STEP;

            if x < 0 || y < 0 {
                continue;
            }
            let (x, y) = (x as u32, y as u32);
            if x + w > self.width || y + h > self.height {
                continue;
            }
            if self.is_free(x, y, w, h) {
                return Some((x, y));
            }
        }
    }
}

/// Place `frequencies` (already ordered heaviest first) on a canvas. Words
/// that measure zero pixels or fit nowhere even at scale 1 are dropped.
pub fn lay_out_words(frequencies: &[(String, u32)], width: u32, height: u32) -> Layout {
    let mut layout = Layout {
        width,
        height,
        words: Vec::new(),
    };
    let Some(max_count) = frequencies.first().map(|(_, count)| *count) else {
        return layout;
    };

    let top = top_scale(height);
    let mut occupancy = Occupancy::new(width, height);

    for (word, count) in frequencies {
        let start_scale = scale_for(*count, max_count, top);
        for scale in (1..=start_scale).rev() {
            let text_width = font::text_width(word, scale);
            if text_width == 0 {
                break;
            }
            let box_width = text_width + 2 * PADDING;
            let box_height = font::text_height(scale) + 2 * PADDING;
            if box_width > width || box_height > height {
                continue;
            }
            if let Some((box_x, box_y)) = occupancy.find_spot(box_width, box_height) {
                occupancy.mark(box_x, box_y, box_width, box_height);
                layout.words.push(PlacedWord {
                    word: word.clone(),
                    count: *count,
                    scale,
                    x: box_x + PADDING,
                    y: box_y + PADDING,
                    width: text_width,
                    height: font::text_height(scale),
                    color_index: layout.words.len(),
                });
                break;
            }
        }
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frequencies(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs
            .iter()
            .map(|(word, count)| (word.to_string(), *count))
            .collect()
    }

    fn overlaps(a: &PlacedWord, b: &PlacedWord) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    #[test]
    fn heaviest_word_lands_centered() {
        let layout = lay_out_words(&frequencies(&[("center", 5)]), 800, 400);
        let word = layout.words.first().expect("word should place");

        let mid_x = word.x + word.width / 2;
        let mid_y = word.y + word.height / 2;
        assert!((i64::from(mid_x) - 400).abs() <= 2, "x center was {mid_x}");
        assert!((i64::from(mid_y) - 200).abs() <= 2, "y center was {mid_y}");
    }

    #[test]
    fn placed_words_never_overlap() {
        let pairs: Vec<(String, u32)> = (0..30)
            .map(|i| (format!("word{i}"), 30 - i))
            .collect();
        let layout = lay_out_words(&pairs, 800, 400);
        assert!(layout.words.len() > 10, "most words should place");

        for (i, a) in layout.words.iter().enumerate() {
            for b in &layout.words[i + 1..] {
                assert!(!overlaps(a, b), "{} overlaps {}", a.word, b.word);
            }
        }
    }

    #[test]
    fn placed_words_stay_inside_the_canvas() {
        let layout = lay_out_words(&frequencies(&[("aa", 9), ("bb", 4), ("cc", 1)]), 200, 100);
        for word in &layout.words {
            assert!(word.x + word.width <= 200);
            assert!(word.y + word.height <= 100);
        }
    }

    #[test]
    fn heavier_words_render_larger() {
        let layout = lay_out_words(&frequencies(&[("big", 10), ("tiny", 1)]), 800, 400);
        let big = &layout.words[0];
        let tiny = &layout.words[1];
        assert!(big.scale > tiny.scale, "{} vs {}", big.scale, tiny.scale);
    }

    #[test]
    fn equal_counts_render_at_equal_scale() {
        let layout = lay_out_words(&frequencies(&[("peer", 3), ("pair", 3)]), 800, 400);
        assert_eq!(layout.words[0].scale, layout.words[1].scale);
    }

    #[test]
    fn unmeasurable_words_are_dropped() {
        let layout = lay_out_words(&frequencies(&[("日本語", 4)]), 800, 400);
        assert!(layout.words.is_empty());
    }

    #[test]
    fn words_too_wide_for_the_canvas_are_dropped() {
        let layout = lay_out_words(&frequencies(&[("incomprehensibilities", 2)]), 40, 40);
        assert!(layout.words.is_empty());
    }
}
