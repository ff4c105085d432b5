// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection overlays
//!
//! Boxes are outlined in a per-class colour and captioned with
//! `"<name> <confidence>"` on a filled tab of the same colour.

use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::warn;

use super::DetectionRecord;

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [52, 69, 147],
    [203, 56, 255],
];

const LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");
const TEXT_COLOUR: Rgb<u8> = Rgb([255, 255, 255]);
const MIN_FONT_PX: f32 = 12.0;

pub(crate) fn class_colour(class_id: u32) -> Rgb<u8> {
    Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

/// Line thickness scaled to the image, at least one pixel
fn line_thickness(width: u32, height: u32) -> u32 {
    ((width.min(height) as f32 / 250.0).round() as u32).max(1)
}

/// Caption height scaled to the image, never below 12px
fn font_scale(width: u32, height: u32) -> PxScale {
    let px = ((width + height) as f32 / 2.0 * 0.035).round();
    PxScale::from(px.max(MIN_FONT_PX))
}

/// Draw every detection as a labelled box onto a copy of `image`
pub fn draw_detections(image: &DynamicImage, detections: &[DetectionRecord]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    let thickness = line_thickness(width, height);
    let scale = font_scale(width, height);

    let font = match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Label font unusable, drawing boxes only: {}", e);
            None
        }
    };

    for detection in detections {
        let colour = class_colour(detection.class_id);
        let x = detection.xmin.round() as i32;
        let y = detection.ymin.round() as i32;
        let w = detection.width().round() as u32;
        let h = detection.height().round() as u32;
        if w == 0 || h == 0 {
            continue;
        }

        for t in 0..thickness {
            let inner_w = w.saturating_sub(2 * t);
            let inner_h = h.saturating_sub(2 * t);
            if inner_w == 0 || inner_h == 0 {
                break;
            }
            let rect = Rect::at(x + t as i32, y + t as i32).of_size(inner_w, inner_h);
            draw_hollow_rect_mut(&mut canvas, rect, colour);
        }

        if let Some(font) = &font {
            draw_label(&mut canvas, detection, (x, y), colour, scale, font);
        }
    }

    canvas
}

/// Caption above the box, or just inside its top edge when there is no room
fn draw_label(
    canvas: &mut RgbImage,
    detection: &DetectionRecord,
    (x, y): (i32, i32),
    colour: Rgb<u8>,
    scale: PxScale,
    font: &FontRef<'_>,
) {
    let text = format!("{} {:.2}", detection.name, detection.confidence);
    let (text_w, text_h) = text_size(scale, font, &text);
    let tab_w = text_w + 2;
    let tab_h = text_h + 2;

    let top = if y >= tab_h as i32 { y - tab_h as i32 } else { y };
    draw_filled_rect_mut(canvas, Rect::at(x, top).of_size(tab_w, tab_h), colour);
    draw_text_mut(canvas, TEXT_COLOUR, x + 1, top + 1, scale, font, &text);
}
