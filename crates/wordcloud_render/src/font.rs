//! Built-in 5×7 bitmap face covering the tokenizer's output alphabet
//! (`a`–`z` drawn with their uppercase shapes, `0`–`9`, apostrophe). Each
//! glyph is seven rows of five bits, most significant bit leftmost.

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Blank column between consecutive glyphs, in glyph units.
pub const GLYPH_SPACING: u32 = 1;

type Glyph = [u8; GLYPH_HEIGHT as usize];

#[rustfmt::skip]
const LETTERS: [Glyph; 26] = [
    [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001], // a
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110], // b
    [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110], // c
    [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110], // d
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111], // e
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000], // f
    [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111], // g
    [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001], // h
    [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110], // i
    [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100], // j
    [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001], // k
    [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111], // l
    [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001], // m
    [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001], // n
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110], // o
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000], // p
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101], // q
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001], // r
    [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110], // s
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100], // t
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110], // u
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100], // v
    [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010], // w
    [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001], // x
    [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100], // y
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111], // z
];

#[rustfmt::skip]
const DIGITS: [Glyph; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110], // 0
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110], // 1
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111], // 2
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110], // 3
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010], // 4
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110], // 5
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110], // 6
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000], // 7
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110], // 8
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100], // 9
];

#[rustfmt::skip]
const APOSTROPHE: Glyph =
    [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000];

/// Bit rows for `c`, or `None` for characters outside the face. Callers skip
/// uncovered characters in both measuring and drawing, so the two stay
/// consistent.
pub fn glyph(c: char) -> Option<&'static Glyph> {
    match c {
        'a'..='z' => Some(&LETTERS[(c as u8 - b'a') as usize]),
        '0'..='9' => Some(&DIGITS[(c as u8 - b'0') as usize]),
        '\'' => Some(&APOSTROPHE),
        _ => None,
    }
}

/// Pixel width of `text` at the given integer scale. Characters without a
/// glyph contribute nothing.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let drawn = text.chars().filter(|c| glyph(*c).is_some()).count() as u32;
    if drawn == 0 {
        return 0;
    }
    (drawn * GLYPH_WIDTH + (drawn - 1) * GLYPH_SPACING) * scale
}

pub fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_covers_the_tokenizer_alphabet() {
        for c in ('a'..='z').chain('0'..='9').chain(std::iter::once('\'')) {
            assert!(glyph(c).is_some(), "missing glyph for {c:?}");
        }
        assert!(glyph('!').is_none());
        assert!(glyph('ä').is_none());
    }

    #[test]
    fn every_glyph_fits_five_columns() {
        for c in ('a'..='z').chain('0'..='9') {
            let rows = glyph(c).expect("glyph should exist");
            for row in rows {
                assert_eq!(row & !0b11111, 0, "glyph {c:?} spills past column 5");
            }
        }
    }

    #[test]
    fn text_width_accounts_for_spacing_and_scale() {
        // Three glyphs: 3*5 px + 2 gaps at scale 1.
        assert_eq!(text_width("abc", 1), 17);
        assert_eq!(text_width("abc", 3), 51);
        assert_eq!(text_width("a", 2), 10);
    }

    #[test]
    fn uncovered_characters_measure_zero() {
        assert_eq!(text_width("!!!", 4), 0);
        assert_eq!(text_width("a!b", 1), 11);
    }
}
