use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};

use tiv::canvas::{ColorMode, TerminalCanvas};
use tiv::color::parse_color;
use tiv::geometry::DisplayOptions;
use tiv::image_source::ImageLoader;
use tiv::pixel::Rgb;
use tiv::playback::{play, sleep_until, Budget, PlaybackOutcome};
use tiv::scroll::ScrollSource;
#[cfg(feature = "video")]
use tiv::video_source::VideoLoader;

#[derive(Debug, Parser)]
#[command(name = "tiv")]
#[command(version = long_version(), disable_version_flag = true)]
#[command(about = "Show images, animations and video in the terminal")]
#[command(after_help = "\
Environment:
  TIV_USE_UPPER_BLOCK=1  render with upper half blocks instead of lower
  TIV_COLORS=256         quantize colors to the 256-color palette

If both --loops and --duration are given, whatever ends first wins.")]
struct Cli {
    /// Output pixel geometry WxH; the default derives from the terminal.
    #[arg(short = 'g', long = "geometry", value_name = "WxH", value_parser = parse_geometry)]
    geometry: Option<(u32, u32)>,

    /// Seconds to wait between multiple images.
    #[arg(short = 'w', long = "wait", value_name = "SECONDS", default_value_t = 0.0)]
    wait: f64,

    /// Stop animations, scrolling and video after this many seconds.
    #[arg(short = 't', long = "duration", value_name = "SECONDS")]
    duration: Option<f64>,

    /// Number of runs through a full animation or scroll cycle.
    #[arg(short = 'c', long = "loops", value_name = "COUNT")]
    loops: Option<u32>,

    /// Render at most this many frames.
    #[arg(short = 'f', long = "max-frames", value_name = "COUNT")]
    max_frames: Option<u64>,

    /// Switch off antialiasing while scaling.
    #[arg(short = 'a', long = "no-antialias")]
    no_antialias: bool,

    /// Trim away the same-color border around the image; the optional value
    /// pre-crops that many pixels first to get rid of an uneven border.
    #[arg(short = 'T', long = "trim", value_name = "PRE-CROP", num_args = 0..=1,
          default_missing_value = "0", require_equals = true)]
    trim: Option<u32>,

    /// Scale to fit the terminal width, even past the terminal height.
    #[arg(short = 'W', long = "fit-width")]
    fit_width: bool,

    /// Upscale images smaller than the terminal to full size.
    #[arg(short = 'U', long = "upscale")]
    upscale: bool,

    /// Treat inputs as video without probing image decoding first.
    #[arg(short = 'V', long = "video")]
    video: bool,

    /// Background color for transparent images.
    #[arg(short = 'b', long = "background", value_name = "COLOR", value_parser = parse_color)]
    background: Option<Rgb>,

    /// Checkerboard pattern color for transparent images.
    #[arg(short = 'B', long = "pattern", value_name = "COLOR", value_parser = parse_color)]
    pattern: Option<Rgb>,

    /// Scroll the image; the optional value is the tick delay in ms.
    #[arg(short = 's', long = "scroll", value_name = "MS", num_args = 0..=1,
          default_missing_value = "60", require_equals = true)]
    scroll: Option<u64>,

    /// Scroll delta per tick, as DX:DY or just DX.
    #[arg(short = 'd', long = "delta", value_name = "DX:DY", default_value = "1:0",
          value_parser = parse_delta)]
    delta: (i32, i32),

    /// Center images horizontally.
    #[arg(short = 'C', long = "center")]
    center: bool,

    /// Print each filename before showing it.
    #[arg(short = 'F', long = "show-filename")]
    show_filename: bool,

    /// Leave the cursor visible during playback.
    #[arg(short = 'E', long = "keep-cursor")]
    keep_cursor: bool,

    /// Print version and exit. The short -V selects video mode instead.
    #[arg(long = "version", action = clap::ArgAction::Version)]
    _version: Option<bool>,

    /// Image or video files to show.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

fn long_version() -> String {
    match option_env!("TIV_GIT_HASH") {
        Some(hash) => format!("{} ({hash})", env!("CARGO_PKG_VERSION")),
        None => env!("CARGO_PKG_VERSION").to_owned(),
    }
}

fn parse_geometry(value: &str) -> Result<(u32, u32), String> {
    let parse = |v: &str| v.trim().parse::<u32>().ok().filter(|&n| n > 0);
    value
        .split_once(['x', 'X'])
        .and_then(|(w, h)| Some((parse(w)?, parse(h)?)))
        .ok_or_else(|| format!("invalid geometry '{value}', expected WxH"))
}

fn parse_delta(value: &str) -> Result<(i32, i32), String> {
    let (dx, dy) = value.split_once(':').unwrap_or((value, "0"));
    let parse = |v: &str| {
        v.trim()
            .parse::<i32>()
            .map_err(|_| format!("invalid delta '{value}', expected DX:DY or DX"))
    };
    Ok((parse(dx)?, parse(dy)?))
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("tiv: {error:#}");
            ExitCode::FAILURE
        }
    }
}

enum ItemOutcome {
    Shown { animated: bool },
    Cancelled,
    Skipped(anyhow::Error),
}

fn run(cli: Cli) -> Result<ExitCode> {
    let (bounds_w, bounds_h) = match cli.geometry {
        Some(bounds) => bounds,
        None => terminal_bounds()?,
    };

    let mut scroll_delay = cli.scroll.map(Duration::from_millis);
    let (dx, dy) = cli.delta;
    if scroll_delay.is_some() && dx == 0 && dy == 0 {
        eprintln!("tiv: scroll delta is 0:0, just showing the image");
        scroll_delay = None;
    }

    // Scrolling along one axis means infinite room there, so the content
    // may as well fill the screen on the other axis.
    let opts = DisplayOptions {
        antialias: !cli.no_antialias,
        upscale: cli.upscale,
        fill_width: cli.fit_width || (scroll_delay.is_some() && dy != 0),
        fill_height: scroll_delay.is_some() && dx != 0,
        center_horizontally: cli.center,
        auto_trim: cli.trim.is_some(),
        crop_border: cli.trim.unwrap_or(0),
        background: cli.background,
        pattern: cli.pattern,
    };

    let budget = Budget {
        duration: cli.duration.map(Duration::from_secs_f64),
        loops: cli.loops,
        max_frames: cli.max_frames,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&cancel))
            .context("failed to register signal handler")?;
    }

    let color_mode = if std::env::var("TIV_COLORS").is_ok_and(|v| v == "256") {
        ColorMode::Indexed256
    } else {
        ColorMode::TrueColor
    };
    let mut canvas = TerminalCanvas::new(
        io::stdout().lock(),
        color_mode,
        env_truthy("TIV_USE_UPPER_BLOCK"),
    );
    if !cli.keep_cursor {
        canvas.cursor_off().context("terminal write failed")?;
    }

    let between_images = Duration::from_secs_f64(cli.wait.max(0.0));
    let mut exit_code = ExitCode::SUCCESS;

    for path in &cli.files {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if cli.show_filename {
            println!("{}", path.display());
        }

        let shown = show_file(
            path,
            !cli.video,
            (bounds_w, bounds_h),
            &opts,
            &budget,
            scroll_delay,
            (dx, dy),
            &cancel,
            &mut canvas,
        )
        .context("terminal write failed")?;

        match shown {
            ItemOutcome::Shown { animated } => {
                if !animated && !between_images.is_zero() {
                    sleep_until(Instant::now() + between_images);
                }
            }
            ItemOutcome::Cancelled => break,
            ItemOutcome::Skipped(error) => {
                eprintln!("tiv: {error:#}");
                exit_code = ExitCode::FAILURE;
            }
        }
    }

    if !cli.keep_cursor {
        canvas.cursor_on().context("terminal write failed")?;
    }
    if cancel.load(Ordering::Relaxed) {
        // Make ^C land on a fresh line.
        println!();
    }
    Ok(exit_code)
}

/// Terminal pixel bounds: one column is one pixel wide, one row two pixels
/// tall, and the last row is left to the shell prompt.
fn terminal_bounds() -> Result<(u32, u32)> {
    let (cols, rows) = crossterm::terminal::size()
        .context("cannot read the terminal size; pass --geometry WxH")?;
    if cols == 0 || rows < 2 {
        return Err(anyhow!(
            "terminal reports an unusable size {cols}x{rows}; pass --geometry WxH"
        ));
    }
    Ok((u32::from(cols), 2 * (u32::from(rows) - 1)))
}

fn env_truthy(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty() && v != "0")
}

fn show_file(
    path: &Path,
    probe_images: bool,
    bounds: (u32, u32),
    opts: &DisplayOptions,
    budget: &Budget,
    scroll_delay: Option<Duration>,
    delta: (i32, i32),
    cancel: &AtomicBool,
    canvas: &mut TerminalCanvas<impl io::Write>,
) -> io::Result<ItemOutcome> {
    let image_error = if probe_images {
        match ImageLoader::load_and_scale(path, bounds.0, bounds.1, opts) {
            Ok(loader) => return show_image(loader, budget, scroll_delay, delta, cancel, canvas),
            Err(error) => Some(error),
        }
    } else {
        None
    };

    show_as_video(path, bounds, opts, budget, cancel, canvas, image_error)
}

#[cfg(feature = "video")]
fn show_as_video(
    path: &Path,
    bounds: (u32, u32),
    opts: &DisplayOptions,
    budget: &Budget,
    cancel: &AtomicBool,
    canvas: &mut TerminalCanvas<impl io::Write>,
    image_error: Option<anyhow::Error>,
) -> io::Result<ItemOutcome> {
    match VideoLoader::load_and_scale(path, bounds.0, bounds.1, opts) {
        Ok(loader) => show_video(loader, budget, cancel, canvas),
        // When image probing already failed, its error usually names the
        // real problem; the video fallback error is just noise.
        Err(video_error) => Ok(ItemOutcome::Skipped(image_error.unwrap_or(video_error))),
    }
}

#[cfg(not(feature = "video"))]
fn show_as_video(
    path: &Path,
    _bounds: (u32, u32),
    _opts: &DisplayOptions,
    _budget: &Budget,
    _cancel: &AtomicBool,
    _canvas: &mut TerminalCanvas<impl io::Write>,
    image_error: Option<anyhow::Error>,
) -> io::Result<ItemOutcome> {
    Ok(ItemOutcome::Skipped(image_error.unwrap_or_else(|| {
        anyhow!("{}: video support is not built in", path.display())
    })))
}

fn show_image(
    mut loader: ImageLoader,
    budget: &Budget,
    scroll_delay: Option<Duration>,
    (dx, dy): (i32, i32),
    cancel: &AtomicBool,
    canvas: &mut TerminalCanvas<impl io::Write>,
) -> io::Result<ItemOutcome> {
    let animated = loader.is_animation();
    let x_offset = loader.x_offset();

    let outcome = if let Some(delay) = scroll_delay {
        let source = loader.into_primary_frame();
        let (window_w, window_h) = (source.width(), source.height());
        let mut scroll = ScrollSource::new(source, window_w, window_h, dx, dy, delay);
        play(&mut scroll, budget, cancel, canvas, x_offset)?
    } else if animated {
        play(&mut loader, budget, cancel, canvas, x_offset)?
    } else {
        // A still image is a one-frame cycle; budgets larger than that
        // would just repaint identical pixels.
        let still = Budget {
            loops: Some(1),
            ..*budget
        };
        play(&mut loader, &still, cancel, canvas, x_offset)?
    };

    Ok(match outcome {
        PlaybackOutcome::Cancelled => ItemOutcome::Cancelled,
        PlaybackOutcome::Stopped => ItemOutcome::Shown { animated },
    })
}

#[cfg(feature = "video")]
fn show_video(
    mut loader: VideoLoader,
    budget: &Budget,
    cancel: &AtomicBool,
    canvas: &mut TerminalCanvas<impl io::Write>,
) -> io::Result<ItemOutcome> {
    let x_offset = loader.x_offset();
    log::debug!("video frame interval {:?}", loader.frame_interval());

    let outcome = match play(&mut loader, budget, cancel, canvas, x_offset) {
        Ok(outcome) => outcome,
        Err(error) => {
            let _ = loader.finish();
            return Err(error);
        }
    };
    if let Err(error) = loader.finish() {
        log::debug!("video teardown: {error:#}");
    }

    Ok(match outcome {
        PlaybackOutcome::Cancelled => ItemOutcome::Cancelled,
        PlaybackOutcome::Stopped => ItemOutcome::Shown { animated: true },
    })
}
