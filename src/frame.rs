use std::ops::Range;

/// Pixels captured by the linear camera in one shot.
pub const FRAME_PIXELS: usize = 102;
/// Pixels in each of the LEFT, MIDDLE and RIGHT segments.
pub const SEGMENT_PIXELS: usize = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Left,
    Middle,
    Right,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Left, Segment::Middle, Segment::Right];

    pub fn range(self) -> Range<usize> {
        let start = match self {
            Self::Left => 0,
            Self::Middle => SEGMENT_PIXELS,
            Self::Right => 2 * SEGMENT_PIXELS,
        };
        start..start + SEGMENT_PIXELS
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Middle => "MIDDLE",
            Self::Right => "RIGHT",
        }
    }
}

/// One complete set of pixel intensities.
///
/// Values are kept exactly as parsed, including out-of-range ones; clamping
/// to a displayable gray level happens in [`crate::strip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: [i32; FRAME_PIXELS],
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            pixels: [0; FRAME_PIXELS],
        }
    }
}

/// What happened while a line was written into a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Slot index and raw text of every token that failed to parse.
    pub malformed: Vec<(usize, String)>,
    /// Slots the line never reached; they keep their previous value.
    pub missing: usize,
    /// Tokens past the last slot, dropped.
    pub overflow: usize,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty() && self.missing == 0 && self.overflow == 0
    }
}

impl Frame {
    pub fn from_pixels(pixels: [i32; FRAME_PIXELS]) -> Self {
        Self { pixels }
    }

    /// Parses `line` into a fresh zeroed frame.
    pub fn parse_line(line: &str) -> (Self, ParseReport) {
        let mut frame = Self::default();
        let report = frame.apply_line(line);
        (frame, report)
    }

    /// Writes the space separated values of `line` into this frame in place.
    ///
    /// Token `i` lands in slot `i`. A token that is not an integer leaves its
    /// slot holding whatever the previous frame had there, and the tokens
    /// after it stay aligned with their own slots. Nothing here fails the
    /// whole line.
    pub fn apply_line(&mut self, line: &str) -> ParseReport {
        let mut report = ParseReport::default();
        let trimmed = line.trim_end_matches(['\r', '\n', ' ']);
        if trimmed.is_empty() {
            report.missing = FRAME_PIXELS;
            log::warn!("empty frame line, keeping previous pixels");
            return report;
        }

        let mut written = 0;
        for (slot, token) in trimmed.split(' ').enumerate() {
            if slot >= FRAME_PIXELS {
                report.overflow += 1;
                continue;
            }
            written = slot + 1;
            match token.parse::<i32>() {
                Ok(value) => self.pixels[slot] = value,
                Err(_) => {
                    log::warn!("parse error at pixel {slot}: {token:?}");
                    report.malformed.push((slot, token.to_owned()));
                }
            }
        }

        report.missing = FRAME_PIXELS - written;
        if report.overflow > 0 {
            log::warn!(
                "frame line has {} value(s) past pixel {}, ignored",
                report.overflow,
                FRAME_PIXELS - 1
            );
        }
        if report.missing > 0 {
            log::debug!("frame line short by {} value(s)", report.missing);
        }
        report
    }

    pub fn pixels(&self) -> &[i32; FRAME_PIXELS] {
        &self.pixels
    }

    pub fn get(&self, slot: usize) -> Option<i32> {
        self.pixels.get(slot).copied()
    }

    pub fn segment(&self, segment: Segment) -> &[i32] {
        &self.pixels[segment.range()]
    }

    pub fn left(&self) -> &[i32] {
        self.segment(Segment::Left)
    }

    pub fn middle(&self) -> &[i32] {
        self.segment(Segment::Middle)
    }

    pub fn right(&self) -> &[i32] {
        self.segment(Segment::Right)
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, Segment, FRAME_PIXELS};

    fn ascending_line() -> String {
        (1..=FRAME_PIXELS)
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn well_formed_line_fills_every_slot_in_order() {
        let (frame, report) = Frame::parse_line(&ascending_line());
        assert!(report.is_clean());
        for slot in 0..FRAME_PIXELS {
            assert_eq!(frame.get(slot), Some(slot as i32 + 1));
        }
    }

    #[test]
    fn malformed_token_keeps_previous_value_in_that_slot_only() {
        let mut frame = Frame::from_pixels([7; FRAME_PIXELS]);
        let mut tokens = (1..=FRAME_PIXELS)
            .map(|value| value.to_string())
            .collect::<Vec<_>>();
        tokens[40] = "4x".to_owned();

        let report = frame.apply_line(&tokens.join(" "));
        let (clean, _) = Frame::parse_line(&ascending_line());

        assert_eq!(report.malformed, vec![(40, "4x".to_owned())]);
        for slot in 0..FRAME_PIXELS {
            if slot == 40 {
                assert_eq!(frame.get(slot), Some(7));
            } else {
                assert_eq!(frame.get(slot), clean.get(slot));
            }
        }
    }

    #[test]
    fn crlf_and_trailing_space_are_not_tokens() {
        let line = format!("{} \r\n", ascending_line());
        let (frame, report) = Frame::parse_line(&line);
        assert!(report.is_clean());
        assert_eq!(frame.get(FRAME_PIXELS - 1), Some(FRAME_PIXELS as i32));
    }

    #[test]
    fn short_and_long_lines_are_reported() {
        let mut frame = Frame::from_pixels([9; FRAME_PIXELS]);
        let report = frame.apply_line("1 2 3");
        assert_eq!(report.missing, FRAME_PIXELS - 3);
        assert_eq!(frame.get(3), Some(9));

        let long = format!("{} 500 600", ascending_line());
        let report = frame.apply_line(&long);
        assert_eq!(report.overflow, 2);
        assert_eq!(report.missing, 0);
    }

    #[test]
    fn double_space_counts_as_a_malformed_slot() {
        let mut frame = Frame::from_pixels([5; FRAME_PIXELS]);
        let report = frame.apply_line("1  3");
        assert_eq!(report.malformed, vec![(1, String::new())]);
        assert_eq!(frame.get(0), Some(1));
        assert_eq!(frame.get(1), Some(5));
        assert_eq!(frame.get(2), Some(3));
    }

    #[test]
    fn segments_partition_the_frame() {
        let (frame, _) = Frame::parse_line(&ascending_line());
        assert_eq!(frame.left().first(), Some(&1));
        assert_eq!(frame.middle().first(), Some(&35));
        assert_eq!(frame.right().last(), Some(&102));
        let total: usize = Segment::ALL
            .iter()
            .map(|segment| frame.segment(*segment).len())
            .sum();
        assert_eq!(total, FRAME_PIXELS);
    }
}
