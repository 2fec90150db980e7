//! Time-synchronized playback of stored artifacts.
//!
//! A [`PlaybackDriver`] walks `Idle -> Playing -> Finished` exactly once. It
//! shows frames `0..total` in order, sleeps `round(1000 / fps)` ms between
//! them, and deletes every artifact in that range when it is done, whether the
//! run completed, was cancelled, or failed on the display.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::event_log::EventLog;
use crate::store::FrameStore;
use crate::surface::Surface;

/// Cooperative cancellation flag shared between the player and e.g. a signal handler.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// All clones observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// What is being played and how far along it is.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub total_frames: usize,
    pub frame_rate: f64,
    /// Index of the frame currently on screen.
    pub position: usize,
}

impl PlaybackSession {
    pub fn new(total_frames: usize, frame_rate: f64) -> Self {
        Self {
            total_frames,
            frame_rate,
            position: 0,
        }
    }

    /// `round(1000 / frame_rate)` milliseconds; zero for an unusable rate.
    pub fn frame_interval(&self) -> Duration {
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Duration::ZERO;
        }
        Duration::from_millis((1000.0 / self.frame_rate).round() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Finished,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub shown: usize,
    pub skipped: usize,
    pub cancelled: bool,
    pub cleanup_failures: usize,
}

pub struct PlaybackDriver<'a, S: Surface> {
    store: &'a FrameStore,
    surface: S,
    cancel: CancellationToken,
    state: PlaybackState,
    keep_artifacts: bool,
}

impl<'a, S: Surface> PlaybackDriver<'a, S> {
    pub fn new(store: &'a FrameStore, surface: S, cancel: CancellationToken) -> Self {
        Self {
            store,
            surface,
            cancel,
            state: PlaybackState::Idle,
            keep_artifacts: false,
        }
    }

    /// Leave artifacts on disk after playback.
    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    pub fn start(
        &mut self,
        session: &mut PlaybackSession,
        log: &mut EventLog,
    ) -> Result<PlaybackReport> {
        if self.state != PlaybackState::Idle {
            return Err(PipelineError::PlaybackState);
        }
        self.state = PlaybackState::Playing;
        log.record(format!(
            "Playing {} frames at {:.3} fps",
            session.total_frames, session.frame_rate
        ));

        let mut report = PlaybackReport::default();
        let outcome = self.play_frames(session, log, &mut report);
        let restored = self.surface.end();
        self.state = PlaybackState::Finished;

        if !self.keep_artifacts {
            report.cleanup_failures = self.store.delete_range(session.total_frames, log);
        }

        outcome?;
        restored.map_err(PipelineError::Display)?;

        log.record(format!(
            "Playback finished: {} shown, {} skipped{}",
            report.shown,
            report.skipped,
            if report.cancelled { ", cancelled" } else { "" }
        ));
        Ok(report)
    }

    fn play_frames(
        &mut self,
        session: &mut PlaybackSession,
        log: &mut EventLog,
        report: &mut PlaybackReport,
    ) -> Result<()> {
        self.surface.begin().map_err(PipelineError::Display)?;
        let interval = session.frame_interval();

        for index in 0..session.total_frames {
            session.position = index;
            match self.store.read(index) {
                Ok(text) => {
                    self.surface
                        .present(&text)
                        .map_err(PipelineError::Display)?;
                    report.shown += 1;
                }
                Err(e) => {
                    log.warn(format!("skipping frame {}: {}", index, e));
                    report.skipped += 1;
                }
            }

            if self.cancel.is_cancelled() {
                report.cancelled = true;
                log.record(format!("Playback cancelled at frame {}", index));
                break;
            }
            thread::sleep(interval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PlainSurface;
    use std::io;
    use std::time::Instant;

    fn store_with(dir: &std::path::Path, frames: &[&str]) -> FrameStore {
        let store = FrameStore::open(dir).unwrap();
        for (i, f) in frames.iter().enumerate() {
            store.write(i, f).unwrap();
        }
        store
    }

    #[test]
    fn frame_interval_rounds() {
        assert_eq!(
            PlaybackSession::new(1, 30.0).frame_interval(),
            Duration::from_millis(33)
        );
        assert_eq!(
            PlaybackSession::new(1, 29.97).frame_interval(),
            Duration::from_millis(33)
        );
        assert_eq!(
            PlaybackSession::new(1, 24.0).frame_interval(),
            Duration::from_millis(42)
        );
        assert_eq!(PlaybackSession::new(1, 0.0).frame_interval(), Duration::ZERO);
    }

    #[test]
    fn plays_in_order_then_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["a\n", "b\n", "c\n"]);
        let mut log = EventLog::disabled();
        let mut session = PlaybackSession::new(3, 1000.0);

        let mut driver =
            PlaybackDriver::new(&store, PlainSurface::new(Vec::new()), CancellationToken::new());
        assert_eq!(driver.state(), PlaybackState::Idle);
        let report = driver.start(&mut session, &mut log).unwrap();

        assert_eq!(driver.state(), PlaybackState::Finished);
        assert_eq!(report.shown, 3);
        assert_eq!(session.position, 2);
        assert_eq!(driver.into_surface().into_inner(), b"a\nb\nc\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_frames_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["a\n"]);
        store.write(2, "c\n").unwrap();
        let mut log = EventLog::disabled();
        let mut session = PlaybackSession::new(3, 1000.0);

        let mut driver =
            PlaybackDriver::new(&store, PlainSurface::new(Vec::new()), CancellationToken::new());
        let report = driver.start(&mut session, &mut log).unwrap();
        assert_eq!(report.shown, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(driver.surface().get_ref(), b"a\nc\n");
    }

    #[test]
    fn cannot_start_twice() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &[]);
        let mut log = EventLog::disabled();
        let mut session = PlaybackSession::new(0, 30.0);
        let mut driver =
            PlaybackDriver::new(&store, PlainSurface::new(Vec::new()), CancellationToken::new());
        driver.start(&mut session, &mut log).unwrap();
        assert!(matches!(
            driver.start(&mut session, &mut log),
            Err(PipelineError::PlaybackState)
        ));
    }

    #[test]
    fn cancellation_stops_before_next_sleep() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["a\n", "b\n", "c\n", "d\n"]);
        let mut log = EventLog::disabled();
        // one frame per second: without cancellation this would take four seconds
        let mut session = PlaybackSession::new(4, 1.0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = Instant::now();
        let mut driver = PlaybackDriver::new(&store, PlainSurface::new(Vec::new()), cancel);
        let report = driver.start(&mut session, &mut log).unwrap();
        assert!(started.elapsed() < Duration::from_millis(900));
        assert!(report.cancelled);
        assert_eq!(report.shown, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn duration_tracks_frame_rate() {
        let dir = tempfile::tempdir().unwrap();
        let frames = ["x\n"; 5];
        let store = store_with(dir.path(), &frames);
        let mut log = EventLog::disabled();
        let mut session = PlaybackSession::new(5, 50.0);
        let expected = session.frame_interval() * 5;

        let started = Instant::now();
        let mut driver =
            PlaybackDriver::new(&store, PlainSurface::new(Vec::new()), CancellationToken::new());
        driver.start(&mut session, &mut log).unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= expected);
        assert!(elapsed < expected + session.frame_interval() + Duration::from_millis(250));
    }

    struct BrokenSurface;

    impl Surface for BrokenSurface {
        fn begin(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn present(&mut self, _frame: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn end(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn display_failure_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["a\n", "b\n"]);
        let mut log = EventLog::disabled();
        let mut session = PlaybackSession::new(2, 1000.0);

        let mut driver = PlaybackDriver::new(&store, BrokenSurface, CancellationToken::new());
        let err = driver.start(&mut session, &mut log).unwrap_err();
        assert!(matches!(err, PipelineError::Display(_)));
        assert_eq!(driver.state(), PlaybackState::Finished);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn kept_artifacts_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["a\n"]);
        let mut log = EventLog::disabled();
        let mut session = PlaybackSession::new(1, 1000.0);
        let mut driver =
            PlaybackDriver::new(&store, PlainSurface::new(Vec::new()), CancellationToken::new())
                .keep_artifacts(true);
        driver.start(&mut session, &mut log).unwrap();
        assert!(store.path_for(0).exists());
    }
}
