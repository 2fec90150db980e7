//! Extraction and playback passes.

use crate::ascii::AsciiEncoder;
use crate::blend::TemporalBlender;
use crate::error::{PipelineError, Result};
use crate::event_log::EventLog;
use crate::playback::{CancellationToken, PlaybackDriver, PlaybackReport, PlaybackSession};
use crate::preprocessing::Preprocessor;
use crate::progress::{percent_complete, ProgressReporter};
use crate::source::FrameSource;
use crate::store::FrameStore;
use crate::surface::Surface;
use crate::ConversionOptions;

/// Outcome of the extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSummary {
    /// Session to hand to the playback pass.
    pub session: PlaybackSession,
    /// Frames decoded and encoded.
    pub extracted: usize,
    /// Frames whose artifact could not be written.
    pub write_failures: usize,
    pub cancelled: bool,
}

/// Decode every frame, blend it with its predecessor and store it as text.
///
/// The source is rewound to frame 0 first, so a source that has already been
/// read can be extracted again. The frame count is taken from the source
/// before the first frame is decoded. A failed artifact write is logged and
/// skipped; a vanished artifact directory aborts the pass. A token tripped at
/// any point, including as the source runs dry, marks the pass cancelled.
pub fn extract<S, P>(
    source: &mut S,
    store: &FrameStore,
    options: &ConversionOptions,
    progress: &mut P,
    cancel: &CancellationToken,
    log: &mut EventLog,
) -> Result<ExtractionSummary>
where
    S: FrameSource + ?Sized,
    P: ProgressReporter + ?Sized,
{
    let preprocessor = Preprocessor::new(options.scale_x, options.scale_y)?;
    let mut blender = TemporalBlender::new(options.alpha)?;
    let encoder = AsciiEncoder::new(&options.ascii_chars)?;

    let total_frames = source.frame_count();
    let frame_rate = source.frame_rate();
    log.record(format!("Source reports {} frames at {:.3} fps", total_frames, frame_rate));

    let mut extracted = 0;
    let mut write_failures = 0;

    source.seek(0)?;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let raw = match source.next_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            // Ctrl-C reaches the decoder process too, which then exits abnormally
            Err(e) if cancel.is_cancelled() => {
                log::debug!("decoder stopped after cancellation: {}", e);
                break;
            }
            Err(e) => return Err(e),
        };

        let intensity = preprocessor.apply(&raw);
        let blended = blender.push(intensity);
        let text = encoder.encode(&blended);

        match store.write(extracted, &text) {
            Ok(()) => {}
            Err(e @ PipelineError::StorageWriteFailure { .. }) => {
                write_failures += 1;
                log.warn(e.to_string());
            }
            Err(e) => return Err(e),
        }

        progress.report(percent_complete(extracted, total_frames));
        extracted += 1;
    }
    progress.finish();

    let cancelled = cancel.is_cancelled();
    if cancelled {
        log.record(format!("Extraction cancelled at frame {}", extracted));
    }
    if total_frames != 0 && extracted != total_frames && !cancelled {
        log.warn(format!(
            "decoder produced {} frames but the container reported {}",
            extracted, total_frames
        ));
    }
    log.record(format!("Converted {} frames", extracted));

    Ok(ExtractionSummary {
        session: PlaybackSession::new(total_frames, frame_rate),
        extracted,
        write_failures,
        cancelled,
    })
}

/// Combined result of a full extract-and-play cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub extraction: ExtractionSummary,
    /// `None` when playback was skipped.
    pub playback: Option<PlaybackReport>,
}

/// Everything a full cycle needs besides the source.
pub struct Pipeline<'a> {
    pub store: &'a FrameStore,
    pub options: &'a ConversionOptions,
    pub cancel: CancellationToken,
    /// Extract only and leave artifacts on disk.
    pub skip_playback: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a FrameStore, options: &'a ConversionOptions) -> Self {
        Self {
            store,
            options,
            cancel: CancellationToken::new(),
            skip_playback: false,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn skip_playback(mut self, skip: bool) -> Self {
        self.skip_playback = skip;
        self
    }

    /// Run the extraction pass, then the playback pass.
    ///
    /// Playback starts only after every frame has been stored. Artifacts are
    /// removed at the end unless playback is skipped or artifacts are kept.
    pub fn run<S, P, D>(
        &self,
        source: &mut S,
        progress: &mut P,
        surface: D,
        log: &mut EventLog,
    ) -> Result<RunReport>
    where
        S: FrameSource + ?Sized,
        P: ProgressReporter + ?Sized,
        D: Surface,
    {
        let extraction = extract(source, self.store, self.options, progress, &self.cancel, log)?;

        // the playback range must cover every artifact actually written
        let total = extraction.session.total_frames.max(extraction.extracted);
        let mut session = PlaybackSession::new(total, extraction.session.frame_rate);

        if self.skip_playback {
            log.record(format!(
                "Playback skipped, {} frames left in {}",
                extraction.extracted,
                self.store.dir().display()
            ));
            return Ok(RunReport {
                extraction,
                playback: None,
            });
        }

        if extraction.cancelled {
            if !self.options.keep_artifacts {
                self.store.delete_range(total, log);
            }
            return Ok(RunReport {
                extraction,
                playback: None,
            });
        }

        let mut driver = PlaybackDriver::new(self.store, surface, self.cancel.clone())
            .keep_artifacts(self.options.keep_artifacts);
        let playback = driver.start(&mut session, log)?;

        Ok(RunReport {
            extraction,
            playback: Some(playback),
        })
    }
}
