//! Detection overlays drawn straight into RGB frames

use crate::utils::{Detection, Rect};
use image::{Rgb, RgbImage};

/// Box colors, picked by `class_id % PALETTE.len()`
pub const PALETTE: [Rgb<u8>; 4] = [
    Rgb([0, 255, 255]),
    Rgb([0, 255, 0]),
    Rgb([255, 255, 0]),
    Rgb([0, 0, 255]),
];

pub const BOX_THICKNESS: i32 = 3;
pub const LABEL_BAR_HEIGHT: i32 = 20;

const GLYPH_WIDTH: i32 = 8;
const GLYPH_HEIGHT: i32 = 12;
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

pub fn palette_color(class_id: usize) -> Rgb<u8> {
    PALETTE[class_id % PALETTE.len()]
}

/// Draw the box outline, a filled label bar above it and the label text
pub fn draw_detection(image: &mut RgbImage, detection: &Detection, label: &str) {
    let color = palette_color(detection.class_id);
    let rect = detection.rect;

    draw_rect_outline(image, rect, color, BOX_THICKNESS);

    let bar = Rect::new(
        rect.x,
        rect.y.saturating_sub(LABEL_BAR_HEIGHT),
        rect.width,
        LABEL_BAR_HEIGHT,
    );
    fill_rect(image, bar, color);

    // Baseline 5 px above the box edge
    let text_top = rect.y.saturating_sub(5 + GLYPH_HEIGHT - 2);
    draw_text(image, label, rect.x, text_top, TEXT_COLOR);
}

/// Outline drawn inwards from the rectangle edges, clipped to the image
pub fn draw_rect_outline(image: &mut RgbImage, rect: Rect, color: Rgb<u8>, thickness: i32) {
    if rect.width <= 0 || rect.height <= 0 {
        return;
    }
    let t = thickness.min(rect.width).min(rect.height);

    fill_rect(image, Rect::new(rect.x, rect.y, rect.width, t), color);
    fill_rect(image, Rect::new(rect.x, rect.bottom() - t, rect.width, t), color);
    fill_rect(image, Rect::new(rect.x, rect.y, t, rect.height), color);
    fill_rect(image, Rect::new(rect.right() - t, rect.y, t, rect.height), color);
}

/// Fill a rectangle, clipped to the image
pub fn fill_rect(image: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.right().min(width);
    let y1 = rect.bottom().min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Render `text` with the built-in 8x12 font. Characters without a glyph
/// advance as blanks.
pub fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let mut pen_x = x;

    for ch in text.chars() {
        if pen_x >= width {
            break;
        }
        if let Some(pattern) = glyph(ch) {
            for (row, bits) in pattern.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..GLYPH_WIDTH {
                    let px = pen_x + col;
                    if px >= 0 && px < width && (bits >> (7 - col)) & 1 == 1 {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
        pen_x += GLYPH_WIDTH;
    }
}

fn glyph(ch: char) -> Option<&'static [u8; 12]> {
    FONT.iter().find(|(c, _)| *c == ch).map(|(_, pattern)| pattern)
}

#[rustfmt::skip]
const FONT: &[(char, [u8; 12])] = &[
    ('A', [0x00, 0x18, 0x24, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00]),
    ('B', [0x00, 0x7C, 0x42, 0x42, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x7C, 0x00, 0x00]),
    ('C', [0x00, 0x3C, 0x42, 0x40, 0x40, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00]),
    ('D', [0x00, 0x78, 0x44, 0x42, 0x42, 0x42, 0x42, 0x42, 0x44, 0x78, 0x00, 0x00]),
    ('E', [0x00, 0x7E, 0x40, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x40, 0x7E, 0x00, 0x00]),
    ('F', [0x00, 0x7E, 0x40, 0x40, 0x40, 0x7C, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00]),
    ('G', [0x00, 0x3C, 0x42, 0x40, 0x40, 0x4E, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00]),
    ('H', [0x00, 0x42, 0x42, 0x42, 0x42, 0x7E, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00]),
    ('I', [0x00, 0x3E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00]),
    ('L', [0x00, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x40, 0x7E, 0x00, 0x00]),
    ('M', [0x00, 0x42, 0x66, 0x5A, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00]),
    ('N', [0x00, 0x42, 0x62, 0x52, 0x4A, 0x46, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00]),
    ('O', [0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00]),
    ('P', [0x00, 0x7C, 0x42, 0x42, 0x42, 0x7C, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00]),
    ('R', [0x00, 0x7C, 0x42, 0x42, 0x42, 0x7C, 0x48, 0x44, 0x42, 0x42, 0x00, 0x00]),
    ('S', [0x00, 0x3C, 0x42, 0x40, 0x30, 0x0C, 0x02, 0x42, 0x42, 0x3C, 0x00, 0x00]),
    ('T', [0x00, 0x7F, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00]),
    ('U', [0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00]),
    ('Y', [0x00, 0x41, 0x22, 0x14, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00]),
    ('a', [0x00, 0x00, 0x00, 0x3C, 0x02, 0x3E, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00]),
    ('b', [0x00, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x62, 0x5C, 0x00, 0x00]),
    ('c', [0x00, 0x00, 0x00, 0x3C, 0x42, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00]),
    ('d', [0x00, 0x02, 0x02, 0x3A, 0x46, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00]),
    ('e', [0x00, 0x00, 0x00, 0x3C, 0x42, 0x7E, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00]),
    ('f', [0x00, 0x0C, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00, 0x00]),
    ('g', [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x46, 0x3A, 0x02, 0x3C, 0x00, 0x00]),
    ('h', [0x00, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00]),
    ('i', [0x00, 0x08, 0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00]),
    ('j', [0x00, 0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x44, 0x38, 0x00, 0x00]),
    ('k', [0x00, 0x40, 0x40, 0x44, 0x48, 0x70, 0x48, 0x44, 0x42, 0x41, 0x00, 0x00]),
    ('l', [0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00]),
    ('m', [0x00, 0x00, 0x00, 0x76, 0x49, 0x49, 0x49, 0x49, 0x49, 0x49, 0x00, 0x00]),
    ('n', [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00]),
    ('o', [0x00, 0x00, 0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00]),
    ('p', [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x62, 0x5C, 0x40, 0x40, 0x00, 0x00]),
    ('q', [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x46, 0x3A, 0x02, 0x02, 0x00, 0x00]),
    ('r', [0x00, 0x00, 0x00, 0x5C, 0x62, 0x40, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00]),
    ('s', [0x00, 0x00, 0x00, 0x3E, 0x40, 0x3C, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00]),
    ('t', [0x00, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x10, 0x0C, 0x00, 0x00]),
    ('u', [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00]),
    ('v', [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x24, 0x24, 0x18, 0x18, 0x00, 0x00]),
    ('w', [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x5A, 0x66, 0x42, 0x42, 0x00, 0x00]),
    ('x', [0x00, 0x00, 0x00, 0x42, 0x24, 0x18, 0x18, 0x24, 0x42, 0x42, 0x00, 0x00]),
    ('y', [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x26, 0x1A, 0x02, 0x3C, 0x00, 0x00]),
    ('z', [0x00, 0x00, 0x00, 0x7E, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00]),
    ('0', [0x00, 0x3C, 0x42, 0x46, 0x4A, 0x52, 0x62, 0x42, 0x42, 0x3C, 0x00, 0x00]),
    ('1', [0x00, 0x08, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00]),
    ('2', [0x00, 0x3C, 0x42, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00]),
    ('3', [0x00, 0x3C, 0x42, 0x02, 0x1C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00]),
    ('4', [0x00, 0x04, 0x0C, 0x14, 0x24, 0x44, 0x7E, 0x04, 0x04, 0x04, 0x00, 0x00]),
    ('5', [0x00, 0x7E, 0x40, 0x40, 0x7C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00]),
    ('6', [0x00, 0x1C, 0x20, 0x40, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00]),
    ('7', [0x00, 0x7E, 0x02, 0x04, 0x08, 0x08, 0x10, 0x10, 0x20, 0x20, 0x00, 0x00]),
    ('8', [0x00, 0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00]),
    ('9', [0x00, 0x3C, 0x42, 0x42, 0x42, 0x3E, 0x02, 0x04, 0x08, 0x70, 0x00, 0x00]),
    (':', [0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00]),
    ('.', [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00]),
    ('-', [0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
    ('%', [0x00, 0x62, 0x64, 0x08, 0x10, 0x10, 0x20, 0x26, 0x46, 0x00, 0x00, 0x00]),
];
