use crate::pixel::Rgb;

/// Second color of the transparency checkerboard.
const CHECKER_ALT: Rgb = Rgb::new(102, 102, 102);
/// Source-pixel edge length of one checkerboard cell.
const CHECKER_CELL: u32 = 2;

/// What transparent source pixels are composited against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backdrop {
    /// Keep the source color, ignore alpha.
    None,
    Solid(Rgb),
    Checker(Rgb),
}

impl Backdrop {
    /// An explicit background wins over a checkerboard pattern.
    pub fn from_colors(background: Option<Rgb>, pattern: Option<Rgb>) -> Self {
        match (background, pattern) {
            (Some(color), _) => Self::Solid(color),
            (None, Some(color)) => Self::Checker(color),
            (None, None) => Self::None,
        }
    }
}

/// Composite one RGBA sample at source position `(x, y)` against the backdrop.
pub fn composite(r: u8, g: u8, b: u8, a: u8, x: u32, y: u32, backdrop: Backdrop) -> Rgb {
    if a == 255 {
        return Rgb::new(r, g, b);
    }
    let under = match backdrop {
        Backdrop::None => return Rgb::new(r, g, b),
        Backdrop::Solid(color) => color,
        Backdrop::Checker(color) => {
            if ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0 {
                color
            } else {
                CHECKER_ALT
            }
        }
    };
    Rgb::new(
        blend_channel(r, under.r, a),
        blend_channel(g, under.g, a),
        blend_channel(b, under.b, a),
    )
}

fn blend_channel(src: u8, dst: u8, alpha: u8) -> u8 {
    let alpha = u16::from(alpha);
    let inv_alpha = 255 - alpha;
    ((u16::from(src) * alpha + u16::from(dst) * inv_alpha + 127) / 255) as u8
}

/// Nearest ANSI 256-color index: grayscale ramp for neutral colors, the
/// 6x6x6 cube otherwise. Cube levels [0, 95, 135, 175, 215, 255] are not
/// uniformly spaced, so channels snap at the midpoints between levels.
pub fn rgb_to_256(color: Rgb) -> u8 {
    if color.r == color.g && color.g == color.b {
        let v = color.r;
        if v < 8 {
            return 16;
        }
        if v > 248 {
            return 231;
        }
        return 232 + ((v - 8) / 10).min(23);
    }
    16 + 36 * cube_index(color.r) + 6 * cube_index(color.g) + cube_index(color.b)
}

fn cube_index(v: u8) -> u8 {
    if v < 48 {
        0
    } else if v < 115 {
        1
    } else {
        (v - 35) / 40
    }
}

/// Parse a `-b`/`-B` color argument: `#rgb`, `#rrggbb`, or a small set of
/// named colors. The error form suits clap's value parser.
pub fn parse_color(input: &str) -> Result<Rgb, String> {
    let input = input.trim();
    if let Some(hex) = input.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| format!("invalid hex color '{input}'"));
    }
    match input.to_ascii_lowercase().as_str() {
        "black" => Ok(Rgb::new(0, 0, 0)),
        "white" => Ok(Rgb::new(255, 255, 255)),
        "red" => Ok(Rgb::new(255, 0, 0)),
        "green" => Ok(Rgb::new(0, 255, 0)),
        "blue" => Ok(Rgb::new(0, 0, 255)),
        "yellow" => Ok(Rgb::new(255, 255, 0)),
        "magenta" => Ok(Rgb::new(255, 0, 255)),
        "cyan" => Ok(Rgb::new(0, 255, 255)),
        "gray" | "grey" => Ok(Rgb::new(128, 128, 128)),
        other => Err(format!("unknown color '{other}'")),
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    match hex.len() {
        3 => {
            let mut channels = [0u8; 3];
            for (slot, c) in channels.iter_mut().zip(hex.chars()) {
                let nibble = c.to_digit(16)? as u8;
                *slot = nibble << 4 | nibble;
            }
            Some(Rgb::new(channels[0], channels[1], channels[2]))
        }
        6 => {
            let value = u32::from_str_radix(hex, 16).ok()?;
            Some(Rgb::new(
                (value >> 16) as u8,
                (value >> 8) as u8,
                value as u8,
            ))
        }
        _ => None,
    }
}
