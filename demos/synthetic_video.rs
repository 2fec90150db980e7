//! Example: play a generated fade-in without any video file or ffmpeg
//!
//! Run with: cargo run --example synthetic_video

use std::path::Path;
use vid2ascii::progress::BarReporter;
use vid2ascii::{surface, ConversionOptions, EventLog, FrameStore, MemorySource, Pipeline};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let frames_dir = Path::new("example_frames");
    std::fs::create_dir_all(frames_dir)?;

    // 90 frames, black to white, at 30 fps
    let levels = (0..90u32).map(|i| (i * 255 / 89) as u8);
    let mut source = MemorySource::uniform(200, 200, 30.0, levels);

    let store = FrameStore::open(frames_dir)?;
    let options = ConversionOptions::default();
    let mut log = EventLog::disabled();

    let report = Pipeline::new(&store, &options).run(
        &mut source,
        &mut BarReporter::new(),
        surface::select(),
        &mut log,
    )?;

    println!(
        "Extracted {} frames, played {}",
        report.extraction.extracted,
        report.playback.map(|p| p.shown).unwrap_or(0)
    );
    std::fs::remove_dir(frames_dir)?;
    Ok(())
}
