use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, ImageFormat, ImageReader, RgbImage, RgbaImage};

use crate::color::{composite, Backdrop};
use crate::geometry::{resolve_geometry, DisplayOptions};
use crate::pixel::{PixelBuffer, Rgb};
use crate::playback::{FrameSource, FrameStep};
use crate::trim::trim_rect;

/// Hold time for animation frames whose container reports no delay.
const DEFAULT_FRAME_HOLD: Duration = Duration::from_millis(100);

/// A decoded, composited, trimmed and scaled image, ready for the playback
/// loop. Animations cycle forever; the budget decides when to stop.
pub struct ImageLoader {
    frames: Vec<(PixelBuffer, Duration)>,
    cursor: usize,
    x_offset: u32,
}

impl ImageLoader {
    pub fn load_and_scale(
        path: &Path,
        bounds_w: u32,
        bounds_h: u32,
        opts: &DisplayOptions,
    ) -> Result<Self> {
        let reader = ImageReader::open(path)
            .with_context(|| format!("{}: cannot open", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("{}: cannot probe format", path.display()))?;

        let raw_frames = if reader.format() == Some(ImageFormat::Gif) {
            decode_gif_frames(path)?
        } else {
            let decoded = reader
                .decode()
                .with_context(|| format!("{}: cannot decode", path.display()))?;
            vec![(decoded.to_rgba8(), Duration::ZERO)]
        };

        let backdrop = Backdrop::from_colors(opts.background, opts.pattern);
        let mut frames: Vec<(PixelBuffer, Duration)> = raw_frames
            .into_iter()
            .map(|(rgba, hold)| (composite_frame(&rgba, backdrop), hold))
            .collect();

        if opts.auto_trim {
            // The rectangle comes from the first frame only, so animation
            // geometry stays stable across frames.
            let (x0, y0, w, h) = trim_rect(&frames[0].0, opts.crop_border);
            for (frame, _) in &mut frames {
                *frame = frame.crop(x0, y0, w, h);
            }
        }

        let src_w = frames[0].0.width();
        let src_h = frames[0].0.height();
        let (out_w, out_h) = resolve_geometry(src_w, src_h, bounds_w, bounds_h, opts)
            .with_context(|| format!("{}: cannot fit {src_w}x{src_h}", path.display()))?;
        for (frame, _) in &mut frames {
            *frame = scale_buffer(frame, out_w, out_h, opts.antialias);
        }

        let x_offset = if opts.center_horizontally && out_w < bounds_w {
            (bounds_w - out_w) / 2
        } else {
            0
        };

        Ok(Self {
            frames,
            cursor: 0,
            x_offset,
        })
    }

    pub fn is_animation(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn x_offset(&self) -> u32 {
        self.x_offset
    }

    /// Hand the first frame over, e.g. as the backdrop of a scroll run.
    pub fn into_primary_frame(mut self) -> PixelBuffer {
        self.frames.swap_remove(0).0
    }
}

impl FrameSource for ImageLoader {
    fn next_frame(&mut self) -> Option<FrameStep<'_>> {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.frames.len();
        let (frame, hold) = &self.frames[index];
        Some(FrameStep {
            pixels: frame,
            hold: *hold,
            ends_cycle: index + 1 == self.frames.len(),
        })
    }
}

fn decode_gif_frames(path: &Path) -> Result<Vec<(RgbaImage, Duration)>> {
    let file = File::open(path).with_context(|| format!("{}: cannot open", path.display()))?;
    let decoder = GifDecoder::new(BufReader::new(file))
        .with_context(|| format!("{}: not a readable gif", path.display()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .with_context(|| format!("{}: cannot decode animation", path.display()))?;

    Ok(frames
        .into_iter()
        .map(|frame| {
            let delay = Duration::from(frame.delay());
            let hold = if delay.is_zero() {
                DEFAULT_FRAME_HOLD
            } else {
                delay
            };
            (frame.into_buffer(), hold)
        })
        .collect())
}

fn composite_frame(rgba: &RgbaImage, backdrop: Backdrop) -> PixelBuffer {
    PixelBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        composite(p[0], p[1], p[2], p[3], x, y, backdrop)
    })
}

fn scale_buffer(buffer: &PixelBuffer, out_w: u32, out_h: u32, antialias: bool) -> PixelBuffer {
    if (buffer.width(), buffer.height()) == (out_w, out_h) {
        return buffer.clone();
    }
    let mut img = RgbImage::new(buffer.width(), buffer.height());
    for (x, y, p) in img.enumerate_pixels_mut() {
        let Rgb { r, g, b } = buffer.pixel(x, y);
        *p = image::Rgb([r, g, b]);
    }
    let filter = if antialias {
        FilterType::Triangle
    } else {
        FilterType::Nearest
    };
    let resized = image::imageops::resize(&img, out_w, out_h, filter);
    PixelBuffer::from_fn(out_w, out_h, |x, y| {
        let p = resized.get_pixel(x, y);
        Rgb::new(p[0], p[1], p[2])
    })
}
