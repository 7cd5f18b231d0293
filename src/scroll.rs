use std::time::Duration;

use crate::pixel::PixelBuffer;
use crate::playback::{FrameSource, FrameStep};

/// Frame source that slides a fixed window over one static buffer with
/// wraparound addressing, advancing `(dx, dy)` pixels per tick. A cycle ends
/// when both offsets return to the origin.
pub struct ScrollSource {
    source: PixelBuffer,
    window: PixelBuffer,
    dx: i32,
    dy: i32,
    x_pos: u32,
    y_pos: u32,
    delay: Duration,
}

impl ScrollSource {
    pub fn new(
        source: PixelBuffer,
        window_w: u32,
        window_h: u32,
        dx: i32,
        dy: i32,
        delay: Duration,
    ) -> Self {
        Self {
            window: PixelBuffer::new(window_w, window_h),
            source,
            dx,
            dy,
            x_pos: 0,
            y_pos: 0,
            delay,
        }
    }
}

impl FrameSource for ScrollSource {
    fn next_frame(&mut self) -> Option<FrameStep<'_>> {
        let src_w = self.source.width();
        let src_h = self.source.height();

        for y in 0..self.window.height() {
            for x in 0..self.window.width() {
                let sx = (self.x_pos + x) % src_w;
                let sy = (self.y_pos + y) % src_h;
                self.window.set_pixel(x, y, self.source.pixel(sx, sy));
            }
        }

        self.x_pos = wrap(i64::from(self.x_pos) + i64::from(self.dx), src_w);
        self.y_pos = wrap(i64::from(self.y_pos) + i64::from(self.dy), src_h);

        Some(FrameStep {
            pixels: &self.window,
            hold: self.delay,
            ends_cycle: self.x_pos == 0 && self.y_pos == 0,
        })
    }
}

fn wrap(value: i64, modulus: u32) -> u32 {
    value.rem_euclid(i64::from(modulus)) as u32
}

#[cfg(test)]
mod tests {
    use super::ScrollSource;
    use crate::pixel::{PixelBuffer, Rgb};
    use crate::playback::FrameSource;
    use std::time::Duration;

    fn ramp(width: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, 1, |x, _| Rgb::new(x as u8, 0, 0))
    }

    #[test]
    fn window_translates_with_wraparound() {
        let mut scroll = ScrollSource::new(ramp(4), 2, 1, 1, 0, Duration::ZERO);

        let first = scroll.next_frame().unwrap();
        assert_eq!(first.pixels.pixel(0, 0), Rgb::new(0, 0, 0));
        assert_eq!(first.pixels.pixel(1, 0), Rgb::new(1, 0, 0));

        // Skip ahead to the tick whose window straddles the right edge.
        scroll.next_frame().unwrap();
        scroll.next_frame().unwrap();
        let wrapped = scroll.next_frame().unwrap();
        assert_eq!(wrapped.pixels.pixel(0, 0), Rgb::new(3, 0, 0));
        assert_eq!(wrapped.pixels.pixel(1, 0), Rgb::new(0, 0, 0));
    }

    #[test]
    fn cycle_ends_after_source_width_ticks() {
        let mut scroll = ScrollSource::new(ramp(4), 2, 1, 1, 0, Duration::ZERO);
        let cycle_flags: Vec<bool> = (0..8)
            .map(|_| scroll.next_frame().unwrap().ends_cycle)
            .collect();
        assert_eq!(
            cycle_flags,
            [false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn negative_delta_wraps_backwards() {
        let mut scroll = ScrollSource::new(ramp(5), 1, 1, -2, 0, Duration::ZERO);
        scroll.next_frame().unwrap();
        let second = scroll.next_frame().unwrap();
        assert_eq!(second.pixels.pixel(0, 0), Rgb::new(3, 0, 0));
    }

    #[test]
    fn vertical_scroll_wraps_rows() {
        let source = PixelBuffer::from_fn(1, 3, |_, y| Rgb::new(0, y as u8, 0));
        let mut scroll = ScrollSource::new(source, 1, 2, 0, 1, Duration::ZERO);
        scroll.next_frame().unwrap();
        scroll.next_frame().unwrap();
        let third = scroll.next_frame().unwrap();
        assert_eq!(third.pixels.pixel(0, 0), Rgb::new(0, 2, 0));
        assert_eq!(third.pixels.pixel(0, 1), Rgb::new(0, 0, 0));
    }
}
