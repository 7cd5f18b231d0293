use std::io::{self, Write};

use crate::color::rgb_to_256;
use crate::pixel::{PixelBuffer, Rgb};

const CURSOR_HIDE: &[u8] = b"\x1b[?25l";
const CURSOR_SHOW: &[u8] = b"\x1b[?25h";
const SGR_RESET: &[u8] = b"\x1b[0m";
const UPPER_HALF_BLOCK: &str = "\u{2580}";
const LOWER_HALF_BLOCK: &str = "\u{2584}";

/// Color depth of the emitted SGR sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    TrueColor,
    Indexed256,
}

/// Foreground/background pair of one character cell. A missing background
/// renders as the terminal default (odd trailing pixel rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellColors {
    fg: Rgb,
    bg: Option<Rgb>,
}

/// Paints pixel buffers as half-block character cells on a byte sink.
///
/// Every pair of pixel rows becomes one text row: with the upper-block
/// toggle the glyph is `▀` colored foreground-from-upper/background-from-
/// lower, otherwise `▄` with the roles swapped. Color state is only
/// re-emitted when it changes, and consecutive frames of one image overwrite
/// in place by first moving the cursor back up.
pub struct TerminalCanvas<W: Write> {
    out: W,
    color_mode: ColorMode,
    use_upper_block: bool,
    rows_painted: u32,
    cursor_hidden: bool,
}

impl<W: Write> TerminalCanvas<W> {
    pub fn new(out: W, color_mode: ColorMode, use_upper_block: bool) -> Self {
        Self {
            out,
            color_mode,
            use_upper_block,
            rows_painted: 0,
            cursor_hidden: false,
        }
    }

    pub fn cursor_off(&mut self) -> io::Result<()> {
        self.cursor_hidden = true;
        self.out.write_all(CURSOR_HIDE)?;
        self.out.flush()
    }

    pub fn cursor_on(&mut self) -> io::Result<()> {
        self.cursor_hidden = false;
        self.out.write_all(CURSOR_SHOW)?;
        self.out.flush()
    }

    pub fn cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    /// Open the bracket for one displayed image: the next `send` paints on
    /// fresh lines instead of overwriting the previous frame.
    pub fn begin_image(&mut self) {
        self.rows_painted = 0;
    }

    pub fn end_image(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Emit one frame, indented `x_offset` columns. Flushes so the frame is
    /// visible before the caller sleeps.
    pub fn send(&mut self, frame: &PixelBuffer, x_offset: u32) -> io::Result<()> {
        if self.rows_painted > 0 {
            write!(self.out, "\x1b[{}A", self.rows_painted)?;
        }

        let width = frame.width();
        let height = frame.height();
        let text_rows = height.div_ceil(2);

        for text_row in 0..text_rows {
            if x_offset > 0 {
                write!(self.out, "\x1b[{x_offset}C")?;
            }

            let top_y = 2 * text_row;
            let bottom_y = top_y + 1;
            let mut current: Option<CellColors> = None;

            for x in 0..width {
                let top = frame.pixel(x, top_y);
                let bottom = (bottom_y < height).then(|| frame.pixel(x, bottom_y));
                let (colors, glyph) = self.cell(top, bottom);
                if current != Some(colors) {
                    self.set_colors(colors)?;
                    current = Some(colors);
                }
                self.out.write_all(glyph.as_bytes())?;
            }

            self.out.write_all(SGR_RESET)?;
            self.out.write_all(b"\n")?;
        }

        self.rows_painted = text_rows;
        self.out.flush()
    }

    fn cell(&self, top: Rgb, bottom: Option<Rgb>) -> (CellColors, &'static str) {
        match (self.use_upper_block, bottom) {
            (true, _) => (CellColors { fg: top, bg: bottom }, UPPER_HALF_BLOCK),
            (false, Some(bottom)) => (
                CellColors {
                    fg: bottom,
                    bg: Some(top),
                },
                LOWER_HALF_BLOCK,
            ),
            // Odd trailing row: paint the lone pixel as an upper half
            // against the default background.
            (false, None) => (CellColors { fg: top, bg: None }, UPPER_HALF_BLOCK),
        }
    }

    fn set_colors(&mut self, colors: CellColors) -> io::Result<()> {
        let CellColors { fg, bg } = colors;
        match (self.color_mode, bg) {
            (ColorMode::TrueColor, Some(bg)) => write!(
                self.out,
                "\x1b[38;2;{};{};{};48;2;{};{};{}m",
                fg.r, fg.g, fg.b, bg.r, bg.g, bg.b
            ),
            (ColorMode::TrueColor, None) => {
                write!(self.out, "\x1b[38;2;{};{};{};49m", fg.r, fg.g, fg.b)
            }
            (ColorMode::Indexed256, Some(bg)) => write!(
                self.out,
                "\x1b[38;5;{};48;5;{}m",
                rgb_to_256(fg),
                rgb_to_256(bg)
            ),
            (ColorMode::Indexed256, None) => {
                write!(self.out, "\x1b[38;5;{};49m", rgb_to_256(fg))
            }
        }
    }
}
