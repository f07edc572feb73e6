use std::io::{BufRead, Seek};
use std::time::{Duration, Instant};

use crate::error::{FrameError, FrameResult};
use crate::frame::Frame;
use crate::source::{LiveFeed, RecordedSource};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(40);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing,
}

pub enum Feed<R> {
    Recorded(RecordedSource<R>),
    Live(LiveFeed),
}

/// Sole owner of what is on screen: the current frame, its index, and the
/// play/pause timer. Every UI action and timer tick goes through here.
pub struct PlaybackController<R> {
    feed: Feed<R>,
    frame: Frame,
    index: usize,
    received: usize,
    state: PlaybackState,
    interval: Duration,
    next_tick_at: Option<Instant>,
}

impl<R: BufRead + Seek> PlaybackController<R> {
    /// Shows the first recorded frame and starts playing unless `paused`.
    pub fn recorded(
        mut source: RecordedSource<R>,
        interval: Duration,
        paused: bool,
    ) -> FrameResult<Self> {
        let mut frame = Frame::default();
        let (index, _) = source.next_frame(&mut frame)?;
        let mut controller = Self {
            feed: Feed::Recorded(source),
            frame,
            index,
            received: 0,
            state: PlaybackState::Paused,
            interval,
            next_tick_at: None,
        };
        if !paused {
            controller.play();
        }
        Ok(controller)
    }

    /// Live frames arrive through `feed`; nothing is shown until the first
    /// one does. Pausing holds the displayed frame while the feed keeps
    /// draining.
    pub fn live(feed: LiveFeed) -> Self {
        Self {
            feed: Feed::Live(feed),
            frame: Frame::default(),
            index: 0,
            received: 0,
            state: PlaybackState::Playing,
            interval: DEFAULT_INTERVAL,
            next_tick_at: None,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// 0-based index of the displayed frame. In live mode, the count of
    /// frames received when the displayed one arrived.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Live frames taken from the feed so far, shown or not.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn total_frames(&self) -> Option<usize> {
        match &self.feed {
            Feed::Recorded(source) => Some(source.total_frames()),
            Feed::Live(_) => None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_live(&self) -> bool {
        matches!(self.feed, Feed::Live(_))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the running timer fires next. `None` while paused or live.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick_at
    }

    pub fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        self.state = PlaybackState::Playing;
        if !self.is_live() {
            self.next_tick_at = Some(Instant::now() + self.interval);
        }
        log::debug!("playing from frame {}", self.index);
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.state = PlaybackState::Paused;
        self.next_tick_at = None;
        log::debug!("paused at frame {}", self.index);
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.play(),
        }
    }

    /// Fires the timer if its deadline has passed. Returns true when a new
    /// frame was loaded. A read failure is logged and pauses playback.
    pub fn poll_timer(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.next_tick_at else {
            return false;
        };
        if now < deadline {
            return false;
        }

        match self.tick() {
            Ok(advanced) => {
                if self.is_playing() {
                    self.next_tick_at = Some(now + self.interval);
                }
                advanced
            }
            Err(error) => {
                log::error!("failed to read next frame, pausing: {error}");
                self.pause();
                false
            }
        }
    }

    /// Loads the next recorded frame. Live frames only arrive through
    /// [`Self::drain_live`], so this does nothing there.
    pub fn tick(&mut self) -> FrameResult<bool> {
        let Feed::Recorded(source) = &mut self.feed else {
            return Ok(false);
        };
        let (index, _) = source.next_frame(&mut self.frame)?;
        self.index = index;
        log::trace!("tick -> frame {index}");
        Ok(true)
    }

    /// Jumps to `frame_number`, pausing first. Accepts `0..=total`; on any
    /// error the displayed frame and index are left as they were.
    pub fn seek(&mut self, frame_number: i64) -> FrameResult<()> {
        let Feed::Recorded(source) = &mut self.feed else {
            return Err(FrameError::Unsupported { operation: "seek" });
        };
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.next_tick_at = None;
        }

        let mut target = self.frame.clone();
        let (index, _) = source.seek(frame_number, &mut target)?;
        self.frame = target;
        self.index = index;
        log::debug!("seek -> frame {index}");
        Ok(())
    }

    /// Moves `delta` frames from the current one, wrapping at both ends.
    pub fn step(&mut self, delta: i64) -> FrameResult<()> {
        let total = self
            .total_frames()
            .ok_or(FrameError::Unsupported { operation: "step" })?;
        let target = (self.index as i64 + delta).rem_euclid(total as i64);
        self.seek(target)
    }

    /// Pauses and goes back to the first frame.
    pub fn reset(&mut self) -> FrameResult<()> {
        let Feed::Recorded(source) = &mut self.feed else {
            return Err(FrameError::Unsupported { operation: "reset" });
        };
        self.state = PlaybackState::Paused;
        self.next_tick_at = None;

        source.rewind()?;
        let (index, _) = source.next_frame(&mut self.frame)?;
        self.index = index;
        log::debug!("reset to frame {index}");
        Ok(())
    }

    /// Takes the frame the live reader has queued, if any. Returns true when
    /// the displayed frame changed.
    pub fn drain_live(&mut self) -> bool {
        let Feed::Live(feed) = &mut self.feed else {
            return false;
        };
        let Some(frame) = feed.try_take() else {
            return false;
        };
        self.received += 1;
        if self.state == PlaybackState::Paused {
            return false;
        }
        self.frame = frame;
        self.index = self.received;
        true
    }

    pub fn live_closed(&self) -> bool {
        match &self.feed {
            Feed::Live(feed) => feed.is_closed(),
            Feed::Recorded(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    use super::{PlaybackController, PlaybackState, DEFAULT_INTERVAL};
    use crate::error::FrameError;
    use crate::frame::FRAME_PIXELS;
    use crate::source::{ready_gate, LiveReader, RecordedSource};

    const RETRY: Duration = Duration::from_millis(10);

    fn uniform_line(value: i32) -> String {
        vec![value.to_string(); FRAME_PIXELS].join(" ")
    }

    /// Drains until one more live frame has been taken; returns whether it
    /// was put on screen.
    fn take_next_live(playback: &mut PlaybackController<Cursor<Vec<u8>>>) -> bool {
        let before = playback.received();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let shown = playback.drain_live();
            if playback.received() > before {
                return shown;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no live frame arrived");
    }

    fn controller(frames: &[i32], paused: bool) -> PlaybackController<Cursor<Vec<u8>>> {
        let text = frames
            .iter()
            .map(|value| format!("{}\n", uniform_line(*value)))
            .collect::<String>();
        let source = RecordedSource::from_reader(Cursor::new(text.into_bytes()), "capture.txt")
            .expect("source should open");
        PlaybackController::recorded(source, DEFAULT_INTERVAL, paused).expect("controller")
    }

    #[test]
    fn opens_on_first_frame_and_playing() {
        let playback = controller(&[10, 20, 30], false);
        assert_eq!(playback.index(), 0);
        assert_eq!(playback.frame().get(0), Some(10));
        assert_eq!(playback.state(), PlaybackState::Playing);
        assert!(playback.next_deadline().is_some());
    }

    #[test]
    fn paused_controller_ignores_timer() {
        let mut playback = controller(&[10, 20, 30], true);
        assert!(!playback.poll_timer(Instant::now() + Duration::from_secs(10)));
        assert_eq!(playback.index(), 0);
    }

    #[test]
    fn timer_advances_only_after_deadline() {
        let mut playback = controller(&[10, 20, 30], false);
        let deadline = playback.next_deadline().expect("armed");
        assert!(!playback.poll_timer(deadline - Duration::from_millis(1)));
        assert!(playback.poll_timer(deadline));
        assert_eq!(playback.index(), 1);
        assert!(playback.next_deadline().expect("re-armed") > deadline);
    }

    #[test]
    fn three_ticks_loop_back_to_first_frame() {
        let mut playback = controller(&[10, 20, 30], false);
        for expected in [20, 30, 10] {
            assert!(playback.tick().expect("tick"));
            assert_eq!(playback.frame().get(0), Some(expected));
        }
        assert_eq!(playback.index(), 0);
    }

    #[test]
    fn step_back_from_first_frame_wraps_to_last() {
        let mut playback = controller(&[10, 20, 30], false);
        playback.seek(0).expect("seek");
        playback.step(-1).expect("step");
        assert_eq!(playback.index(), 2);
        assert_eq!(playback.frame().get(0), Some(30));
        assert_eq!(playback.state(), PlaybackState::Paused);

        playback.step(1).expect("step");
        assert_eq!(playback.index(), 0);
    }

    #[test]
    fn out_of_range_seek_keeps_position() {
        let mut playback = controller(&[10, 20, 30], true);
        playback.seek(1).expect("seek");
        for requested in [-1, 4] {
            let error = playback.seek(requested).unwrap_err();
            assert!(error.is_out_of_range());
            assert_eq!(playback.index(), 1);
            assert_eq!(playback.frame().get(0), Some(20));
        }
    }

    #[test]
    fn seek_pauses_playback() {
        let mut playback = controller(&[10, 20, 30], false);
        playback.seek(2).expect("seek");
        assert!(!playback.is_playing());
        assert!(playback.next_deadline().is_none());
    }

    #[test]
    fn reset_returns_to_first_frame_paused() {
        let mut playback = controller(&[10, 20, 30], false);
        playback.tick().expect("tick");
        playback.tick().expect("tick");
        playback.reset().expect("reset");
        assert_eq!(playback.index(), 0);
        assert_eq!(playback.frame().get(0), Some(10));
        assert_eq!(playback.state(), PlaybackState::Paused);
    }

    #[test]
    fn toggle_rearms_timer() {
        let mut playback = controller(&[10, 20], false);
        playback.toggle();
        assert!(playback.next_deadline().is_none());
        playback.toggle();
        assert!(playback.next_deadline().is_some());
    }

    #[test]
    fn live_mode_rejects_seek_and_takes_handoff() {
        let text = format!("{}\n", uniform_line(42));
        let (signal, wait) = ready_gate();
        let reader = LiveReader::from_reader(Cursor::new(text.into_bytes()), RETRY, wait, || {})
            .expect("spawn");
        let mut playback: PlaybackController<Cursor<Vec<u8>>> =
            PlaybackController::live(reader.feed);

        assert!(matches!(
            playback.seek(0),
            Err(FrameError::Unsupported { operation: "seek" })
        ));
        assert!(playback.step(1).is_err());
        assert!(playback.reset().is_err());
        assert_eq!(playback.total_frames(), None);

        signal.signal();
        reader.handle.join().expect("reader");
        assert!(playback.drain_live());
        assert_eq!(playback.index(), 1);
        assert_eq!(playback.frame().get(0), Some(42));
        assert!(!playback.drain_live());
        assert!(playback.live_closed());
    }

    #[test]
    fn paused_live_caption_stays_with_the_shown_frame() {
        let text = format!("{}\n{}\n{}\n", uniform_line(1), uniform_line(2), uniform_line(3));
        let (signal, wait) = ready_gate();
        let reader = LiveReader::from_reader(Cursor::new(text.into_bytes()), RETRY, wait, || {})
            .expect("spawn");
        let mut playback: PlaybackController<Cursor<Vec<u8>>> =
            PlaybackController::live(reader.feed);
        signal.signal();

        assert!(take_next_live(&mut playback));
        assert_eq!((playback.index(), playback.frame().get(0)), (1, Some(1)));

        playback.pause();
        assert!(!take_next_live(&mut playback));
        assert_eq!(playback.received(), 2);
        assert_eq!((playback.index(), playback.frame().get(0)), (1, Some(1)));

        playback.play();
        assert!(take_next_live(&mut playback));
        assert_eq!((playback.index(), playback.frame().get(0)), (3, Some(3)));
    }
}
