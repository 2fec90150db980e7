use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dialoguer::{FuzzySelect, Input};
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vid2ascii::progress::{BarReporter, NoProgress, ProgressReporter};
use vid2ascii::{
    event_log, has_video_extension, surface, AppConfig, CancellationToken, EventLog,
    FfmpegSource, FrameSource, FrameStore, Pipeline, PipelineError,
};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(version, about = "Convert a video to ASCII art and play it in the terminal.")]
struct Args {
    /// Input video file (prompted for when omitted)
    input: Option<PathBuf>,

    /// Directory for the intermediate frame_<n>.txt files
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Directory for the run log
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Horizontal scale factor applied to each frame (0-1)
    #[arg(long)]
    scale_x: Option<f32>,

    /// Vertical scale factor applied to each frame (0-1)
    #[arg(long)]
    scale_y: Option<f32>,

    /// Weight of the current frame when blending with the previous one (0-1)
    #[arg(long)]
    alpha: Option<f32>,

    /// Keep the frame files after playback
    #[arg(long, default_value_t = false)]
    keep_artifacts: bool,

    /// Only extract frames, do not play them
    #[arg(long, default_value_t = false)]
    no_playback: bool,

    /// Do not draw the progress bar
    #[arg(long, short, default_value_t = false)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let interactive = args.input.is_none() && io::stdin().is_terminal();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if interactive {
                let _ = Input::<String>::new()
                    .with_prompt("Press Enter to exit")
                    .allow_empty(true)
                    .interact_text();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut cfg = AppConfig::load()?;
    if let Some(d) = &args.frames_dir {
        cfg.frames_dir = d.clone();
    }
    if let Some(d) = &args.log_dir {
        cfg.log_dir = d.clone();
    }
    if let Some(v) = args.scale_x {
        cfg.scale_x = v;
    }
    if let Some(v) = args.scale_y {
        cfg.scale_y = v;
    }
    if let Some(v) = args.alpha {
        cfg.alpha = v;
    }
    cfg.keep_artifacts |= args.keep_artifacts || args.no_playback;

    let mut log = match event_log::open_in(&cfg.log_dir) {
        Ok(log) => log,
        Err(e) => {
            log::warn!("running without a log file ({}): {}", cfg.log_dir.display(), e);
            EventLog::disabled()
        }
    };
    log.record("Successfully created log file");

    let result = convert_and_play(&args, &cfg, &mut log);
    if let Err(e) = &result {
        log.error(format!("{:#}", e));
    }
    log.close().context("closing log file")?;
    result
}

fn convert_and_play(args: &Args, cfg: &AppConfig, log: &mut EventLog) -> Result<()> {
    let input = match &args.input {
        Some(p) => {
            validate_input(p)?;
            p.clone()
        }
        None => prompt_for_input()?,
    };
    log.record(format!("Input validated: {}", input.display()));

    fs::create_dir_all(&cfg.frames_dir).map_err(|e| {
        log.error(format!("creating {}: {}", cfg.frames_dir.display(), e));
        PipelineError::StorageUnavailable {
            path: cfg.frames_dir.clone(),
        }
    })?;
    log.record(format!("Frames directory ready: {}", cfg.frames_dir.display()));

    let store = FrameStore::open(&cfg.frames_dir)?;
    let stale = store.purge_stale()?;
    if stale > 0 {
        log.record(format!("Removed {} frames left over from an earlier run", stale));
    }

    let mut source = FfmpegSource::open(&input)?;
    log.record(format!(
        "Opened {} ({} frames at {:.3} fps)",
        input.display(),
        source.frame_count(),
        source.frame_rate()
    ));

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log.warn(format!("Ctrl-C will not stop playback cleanly: {}", e));
    }

    let mut progress: Box<dyn ProgressReporter> = if args.quiet {
        Box::new(NoProgress)
    } else {
        Box::new(BarReporter::new())
    };

    let options = cfg.conversion_options();
    let report = Pipeline::new(&store, &options)
        .with_cancellation(cancel)
        .skip_playback(args.no_playback)
        .run(&mut source, progress.as_mut(), surface::select(), log)?;
    drop(source);

    println!("Converted video to: {} frames", report.extraction.extracted);
    if report.extraction.write_failures > 0 {
        println!(
            "{} frames could not be written, see {}",
            report.extraction.write_failures,
            log.path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the log".to_string())
        );
    }
    match report.playback {
        Some(p) if p.cancelled => println!("Playback stopped after {} frames", p.shown),
        Some(p) => println!("Played {} frames", p.shown),
        None if args.no_playback => {
            println!("Frames written to {}", store.dir().display())
        }
        None => println!("Cancelled"),
    }
    Ok(())
}

fn validate_input(path: &Path) -> Result<()> {
    if !has_video_extension(path) {
        return Err(anyhow!(
            "{} is not a supported video file ({})",
            path.display(),
            vid2ascii::VIDEO_EXTENSIONS.join(", ")
        ));
    }
    if !path.is_file() {
        return Err(anyhow!("{} does not exist", path.display()));
    }
    Ok(())
}

fn prompt_for_input() -> Result<PathBuf> {
    if !io::stdin().is_terminal() {
        return Err(anyhow!("Input file must be provided when not running interactively."));
    }

    let files = find_media_files();
    if !files.is_empty() {
        let selection = FuzzySelect::with_theme(&dialoguer::theme::ColorfulTheme::default())
            .with_prompt("Choose a video")
            .default(0)
            .items(&files)
            .interact()?;
        return Ok(PathBuf::from(&files[selection]));
    }

    loop {
        let raw: String = Input::new()
            .with_prompt("Please provide file path to a video")
            .interact_text()?;
        let path = PathBuf::from(raw.trim().replace('\\', "/"));
        match validate_input(&path) {
            Ok(()) => return Ok(path),
            Err(e) => println!("Invalid file path: {}", e),
        }
    }
}

fn find_media_files() -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(".")
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && has_video_extension(e.path()))
        .filter_map(|e| e.path().to_str().map(str::to_string))
        .collect();
    files.sort();
    files
}
