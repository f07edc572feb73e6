//! Pure layout of the intensity strip and the text under it.
//!
//! Nothing here draws; the viewer paints whatever [`StripLayout`] and
//! [`Caption`] describe, so the same state always produces the same picture.

use crate::frame::{Frame, Segment, FRAME_PIXELS, SEGMENT_PIXELS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripGeometry {
    pub origin_x: f32,
    pub origin_y: f32,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl Default for StripGeometry {
    fn default() -> Self {
        Self {
            origin_x: 15.0,
            origin_y: 20.0,
            cell_width: 12.0,
            cell_height: 200.0,
        }
    }
}

impl StripGeometry {
    pub fn strip_width(&self) -> f32 {
        self.cell_width * FRAME_PIXELS as f32
    }

    fn cell_x(&self, slot: usize) -> f32 {
        self.origin_x + self.cell_width * slot as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub slot: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub gray: u8,
}

/// Vertical line on a segment boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guide {
    pub x: f32,
    pub top: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StripLayout {
    pub cells: Vec<Cell>,
    pub guides: Vec<Guide>,
}

impl StripLayout {
    pub fn compute(frame: &Frame, geometry: &StripGeometry, show_delimiters: bool) -> Self {
        let cells = frame
            .pixels()
            .iter()
            .enumerate()
            .map(|(slot, value)| Cell {
                slot,
                x: geometry.cell_x(slot),
                y: geometry.origin_y,
                width: geometry.cell_width,
                height: geometry.cell_height,
                gray: gray_level(*value),
            })
            .collect();

        let guides = if show_delimiters {
            [SEGMENT_PIXELS, 2 * SEGMENT_PIXELS]
                .into_iter()
                .map(|slot| Guide {
                    x: geometry.cell_x(slot),
                    top: geometry.origin_y,
                    bottom: geometry.origin_y + geometry.cell_height,
                })
                .collect()
        } else {
            Vec::new()
        };

        Self { cells, guides }
    }
}

/// Intensities outside 0..=255 are clamped rather than wrapped.
pub fn gray_level(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub counter: String,
    pub segments: Vec<(&'static str, String)>,
}

impl Caption {
    /// `total` is `None` for a live stream.
    pub fn new(frame: &Frame, index: usize, total: Option<usize>) -> Self {
        let counter = match total {
            Some(total) => format!(
                "frame number : {} / {}",
                index,
                total.saturating_sub(1)
            ),
            None => format!("frame number : {} (live)", index),
        };
        let segments = Segment::ALL
            .iter()
            .map(|segment| (segment.label(), format_values(frame.segment(*segment))))
            .collect();
        Self { counter, segments }
    }

    pub fn to_text(&self) -> String {
        let mut text = self.counter.clone();
        text.push('\n');
        for (label, values) in &self.segments {
            text.push_str(&format!("{:<8}{}\n", format!("{label}:"), values.trim_end()));
        }
        text
    }
}

fn format_values(values: &[i32]) -> String {
    values.iter().map(|value| format!("{:03}  ", value)).collect()
}
