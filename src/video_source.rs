use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::geometry::{resolve_geometry, DisplayOptions};
use crate::pixel::{PixelBuffer, Rgb};
use crate::playback::{FrameSource, FrameStep};

const BYTES_PER_PIXEL: usize = 3;
const CHANNEL_DEPTH: usize = 4;

/// Video stream decoded by a spawned `ffmpeg`, scaled by ffmpeg itself to
/// the resolved geometry and delivered as raw RGB24 frames. Plays once;
/// end of stream is end of sequence.
pub struct VideoLoader {
    receiver: mpsc::Receiver<Vec<u8>>,
    worker: Option<JoinHandle<Result<()>>>,
    child: Child,
    frame: PixelBuffer,
    frame_hold: Duration,
    x_offset: u32,
}

impl VideoLoader {
    pub fn load_and_scale(
        path: &Path,
        bounds_w: u32,
        bounds_h: u32,
        opts: &DisplayOptions,
    ) -> Result<Self> {
        if opts.auto_trim {
            // A streaming decode cannot look ahead to find a stable trim
            // rectangle.
            log::warn!("auto-trim is not supported for video; showing the full frame");
        }

        let (src_w, src_h, fps) = probe_stream(path)?;
        let (out_w, out_h) = resolve_geometry(src_w, src_h, bounds_w, bounds_h, opts)
            .with_context(|| format!("{}: cannot fit {src_w}x{src_h}", path.display()))?;
        let frame_hold = Duration::from_secs_f64(1.0 / fps);

        let size = format!("{out_w}x{out_h}");
        let scaler = if opts.antialias { "bilinear" } else { "neighbor" };
        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(size)
            .arg("-sws_flags")
            .arg(scaler)
            .arg("-")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("{}: failed to spawn ffmpeg", path.display()))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to capture ffmpeg stdout"))?;
        let frame_size = out_w as usize * out_h as usize * BYTES_PER_PIXEL;
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(CHANNEL_DEPTH);

        let worker = thread::Builder::new()
            .name("tiv-video-decoder".to_owned())
            .spawn(move || loop {
                let mut buffer = vec![0u8; frame_size];
                match stdout.read_exact(&mut buffer) {
                    Ok(_) => {
                        if sender.send(buffer).is_err() {
                            break Ok(());
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break Ok(()),
                    Err(e) => break Err(anyhow!("failed to read from ffmpeg: {e}")),
                }
            })
            .context("failed to spawn ffmpeg reader thread")?;

        let x_offset = if opts.center_horizontally && out_w < bounds_w {
            (bounds_w - out_w) / 2
        } else {
            0
        };

        Ok(Self {
            receiver,
            worker: Some(worker),
            child,
            frame: PixelBuffer::new(out_w, out_h),
            frame_hold,
            x_offset,
        })
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_hold
    }

    pub fn x_offset(&self) -> u32 {
        self.x_offset
    }

    pub fn finish(mut self) -> Result<()> {
        let _ = self.child.kill();
        let _ = self.child.wait();

        drop(self.receiver);
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow!("ffmpeg reader thread panicked")),
            }
        } else {
            Ok(())
        }
    }
}

impl FrameSource for VideoLoader {
    fn next_frame(&mut self) -> Option<FrameStep<'_>> {
        let bytes = self.receiver.recv().ok()?;
        let width = self.frame.width();
        for y in 0..self.frame.height() {
            for x in 0..width {
                let i = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
                self.frame
                    .set_pixel(x, y, Rgb::new(bytes[i], bytes[i + 1], bytes[i + 2]));
            }
        }
        Some(FrameStep {
            pixels: &self.frame,
            hold: self.frame_hold,
            ends_cycle: false,
        })
    }
}

/// Ask ffprobe for the first video stream's geometry and average frame rate.
fn probe_stream(path: &Path) -> Result<(u32, u32, f64)> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,avg_frame_rate")
        .arg("-of")
        .arg("csv=p=0")
        .arg(path)
        .output()
        .with_context(|| format!("{}: failed to run ffprobe", path.display()))?;

    if !output.status.success() {
        bail!("{}: ffprobe could not read the stream", path.display());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| anyhow!("{}: no video stream found", path.display()))?;
    log::debug!("ffprobe {}: {line}", path.display());
    parse_probe_line(line.trim())
}

fn parse_probe_line(line: &str) -> Result<(u32, u32, f64)> {
    let mut fields = line.split(',');
    let width: u32 = fields
        .next()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| anyhow!("unparseable stream width in '{line}'"))?;
    let height: u32 = fields
        .next()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| anyhow!("unparseable stream height in '{line}'"))?;
    let rate = fields
        .next()
        .ok_or_else(|| anyhow!("missing frame rate in '{line}'"))?;
    let fps = parse_rate(rate.trim())?;
    Ok((width, height, fps))
}

fn parse_rate(rate: &str) -> Result<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().context("frame rate numerator")?;
            let den: f64 = den.trim().parse().context("frame rate denominator")?;
            if den <= 0.0 {
                bail!("frame rate denominator must be positive in '{rate}'");
            }
            num / den
        }
        None => rate.trim().parse().context("frame rate")?,
    };
    if fps <= 0.0 {
        bail!("stream reports a non-positive frame rate '{rate}'");
    }
    Ok(fps)
}
