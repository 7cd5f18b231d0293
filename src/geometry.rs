use anyhow::{bail, Result};

use crate::pixel::Rgb;

/// How a decoded source is fitted, composited and placed. Assembled once in
/// `main` and passed by reference everywhere.
#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    pub antialias: bool,
    pub upscale: bool,
    pub fill_width: bool,
    pub fill_height: bool,
    pub center_horizontally: bool,
    pub auto_trim: bool,
    /// Pixels stripped from every edge before auto-trim inspects the border.
    pub crop_border: u32,
    pub background: Option<Rgb>,
    pub pattern: Option<Rgb>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            upscale: false,
            fill_width: false,
            fill_height: false,
            center_horizontally: false,
            auto_trim: false,
            crop_border: 0,
            background: None,
            pattern: None,
        }
    }
}

/// Fit `src_w x src_h` into the terminal pixel bounds.
///
/// Bounds arrive in pixel units where one character row is two pixels tall;
/// this function is agnostic to that convention. Aspect ratio is preserved
/// unless the corresponding fill flag overrides an axis, and a source that
/// already fits is returned unchanged when upscaling is off.
pub fn resolve_geometry(
    src_w: u32,
    src_h: u32,
    bounds_w: u32,
    bounds_h: u32,
    opts: &DisplayOptions,
) -> Result<(u32, u32)> {
    if src_w == 0 || src_h == 0 {
        bail!("source dimensions must be positive, got {src_w}x{src_h}");
    }
    if bounds_w == 0 || bounds_h == 0 {
        bail!("target bounds must be positive, got {bounds_w}x{bounds_h}");
    }

    let out = match (opts.fill_width, opts.fill_height) {
        (true, true) => (bounds_w, bounds_h),
        (true, false) => {
            let mut out_h = derive_axis(bounds_w, src_h, src_w);
            if !opts.upscale {
                out_h = out_h.min(bounds_h);
            }
            (bounds_w, out_h)
        }
        (false, true) => {
            let mut out_w = derive_axis(bounds_h, src_w, src_h);
            if !opts.upscale {
                out_w = out_w.min(bounds_w);
            }
            (out_w, bounds_h)
        }
        (false, false) => {
            if !opts.upscale && src_w <= bounds_w && src_h <= bounds_h {
                (src_w, src_h)
            } else {
                let scale = f64::min(
                    f64::from(bounds_w) / f64::from(src_w),
                    f64::from(bounds_h) / f64::from(src_h),
                );
                (
                    scale_axis(src_w, scale).min(bounds_w),
                    scale_axis(src_h, scale).min(bounds_h),
                )
            }
        }
    };

    Ok((out.0.max(1), out.1.max(1)))
}

fn derive_axis(fixed: u32, num: u32, den: u32) -> u32 {
    (f64::from(fixed) * f64::from(num) / f64::from(den)).round() as u32
}

fn scale_axis(value: u32, scale: f64) -> u32 {
    (f64::from(value) * scale).round() as u32
}
