use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{FrameError, FrameResult};
use crate::frame::{Frame, ParseReport};

/// A pre-recorded capture: one frame per line, read forward and looped.
///
/// The medium is a forward-only line stream, so seeking replays lines from
/// the start of the file.
pub struct RecordedSource<R> {
    reader: R,
    label: PathBuf,
    total_frames: usize,
    cursor: usize,
    line: Vec<u8>,
}

impl RecordedSource<BufReader<File>> {
    pub fn open(path: &Path) -> FrameResult<Self> {
        let file = File::open(path).map_err(|source| FrameError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }
}

impl<R: BufRead + Seek> RecordedSource<R> {
    /// Wraps an already opened reader. `label` is only used in messages.
    pub fn from_reader(mut reader: R, label: impl AsRef<Path>) -> FrameResult<Self> {
        let total_frames = count_lines(&mut reader)?;
        let label = label.as_ref().to_path_buf();
        if total_frames == 0 {
            return Err(FrameError::EmptySource { path: label });
        }
        reader.seek(SeekFrom::Start(0))?;
        log::info!("opened {} ({} frames)", label.display(), total_frames);

        Ok(Self {
            reader,
            label,
            total_frames,
            cursor: 0,
            line: Vec::new(),
        })
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn label(&self) -> &Path {
        &self.label
    }

    /// Index of the line the next read will return.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Reads the next line into `frame`, looping to the first line after the
    /// last one. Returns the index of the frame just read.
    pub fn next_frame(&mut self, frame: &mut Frame) -> FrameResult<(usize, ParseReport)> {
        if !self.read_line()? {
            log::debug!("end of {}, looping to first frame", self.label.display());
            self.rewind()?;
            if !self.read_line()? {
                return Err(FrameError::EmptySource {
                    path: self.label.clone(),
                });
            }
        }

        let index = self.cursor;
        self.cursor += 1;
        // Undecodable bytes become malformed tokens instead of a read error.
        let report = frame.apply_line(&String::from_utf8_lossy(&self.line));
        Ok((index, report))
    }

    /// Parses frame `frame_number` into `frame`.
    ///
    /// Accepts `0..=total_frames`; `total_frames` itself runs off the end and
    /// lands on frame 0. Out-of-range requests fail before anything is read.
    pub fn seek(
        &mut self,
        frame_number: i64,
        frame: &mut Frame,
    ) -> FrameResult<(usize, ParseReport)> {
        let target = usize::try_from(frame_number)
            .ok()
            .filter(|target| *target <= self.total_frames)
            .ok_or(FrameError::OutOfRange {
                requested: frame_number,
                total: self.total_frames,
            })?;

        let resume = self.cursor;
        if let Err(error) = self.skip_to(target) {
            // Put the cursor back where the displayed frame expects it.
            if let Err(restore) = self.skip_to(resume) {
                log::warn!("could not restore position in {}: {restore}", self.label.display());
            }
            return Err(error);
        }
        self.next_frame(frame)
    }

    fn skip_to(&mut self, target: usize) -> FrameResult<()> {
        self.rewind()?;
        for _ in 0..target {
            if !self.read_line()? {
                break;
            }
            self.cursor += 1;
        }
        Ok(())
    }

    /// Moves the read cursor back to the first frame.
    pub fn rewind(&mut self) -> FrameResult<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.cursor = 0;
        Ok(())
    }

    fn read_line(&mut self) -> FrameResult<bool> {
        self.line.clear();
        let read = self.reader.read_until(b'\n', &mut self.line)?;
        Ok(read > 0)
    }
}

fn count_lines<R: BufRead>(reader: &mut R) -> FrameResult<usize> {
    let mut count = 0;
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(count);
        }
        count += 1;
    }
}
