use crate::pixel::{PixelBuffer, Rgb};

/// Strip `crop_border` pixels from every edge, then keep removing the outer
/// ring while it is one solid color. The result never shrinks below 1x1 and
/// the source buffer is left untouched.
pub fn trim_borders(buffer: &PixelBuffer, crop_border: u32) -> PixelBuffer {
    let (x0, y0, w, h) = trim_rect(buffer, crop_border);
    buffer.crop(x0, y0, w, h)
}

/// The `(x0, y0, width, height)` rectangle [`trim_borders`] would keep.
/// Exposed so a multi-frame sequence can trim every frame to the rectangle
/// computed from its first frame.
pub fn trim_rect(buffer: &PixelBuffer, crop_border: u32) -> (u32, u32, u32, u32) {
    let mut x0 = 0;
    let mut y0 = 0;
    let mut w = buffer.width();
    let mut h = buffer.height();

    let crop_x = crop_border.min((w - 1) / 2);
    let crop_y = crop_border.min((h - 1) / 2);
    x0 += crop_x;
    y0 += crop_y;
    w -= 2 * crop_x;
    h -= 2 * crop_y;

    while !(w == 1 && h == 1) {
        if uniform_ring_color(buffer, x0, y0, w, h).is_none() {
            break;
        }
        if w <= 2 || h <= 2 {
            // The ring is the whole remaining region; it is uniform, so a
            // single pixel of it represents the buffer.
            w = 1;
            h = 1;
            break;
        }
        x0 += 1;
        y0 += 1;
        w -= 2;
        h -= 2;
    }

    (x0, y0, w, h)
}

/// The single color of the outer ring of the region, if it has one.
fn uniform_ring_color(buffer: &PixelBuffer, x0: u32, y0: u32, w: u32, h: u32) -> Option<Rgb> {
    let color = buffer.pixel(x0, y0);
    let x1 = x0 + w - 1;
    let y1 = y0 + h - 1;
    for x in x0..=x1 {
        if buffer.pixel(x, y0) != color || buffer.pixel(x, y1) != color {
            return None;
        }
    }
    for y in y0..=y1 {
        if buffer.pixel(x0, y) != color || buffer.pixel(x1, y) != color {
            return None;
        }
    }
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::trim_borders;
    use crate::pixel::{PixelBuffer, Rgb};

    const BORDER: Rgb = Rgb::new(255, 255, 255);
    const INK: Rgb = Rgb::new(10, 20, 30);

    fn bordered(content_w: u32, content_h: u32, border: u32) -> PixelBuffer {
        PixelBuffer::from_fn(
            content_w + 2 * border,
            content_h + 2 * border,
            |x, y| {
                let inside = x >= border
                    && x < border + content_w
                    && y >= border
                    && y < border + content_h;
                if inside {
                    Rgb::new(x as u8, y as u8, 0)
                } else {
                    BORDER
                }
            },
        )
    }

    #[test]
    fn removes_a_uniform_border() {
        let trimmed = trim_borders(&bordered(3, 2, 1), 0);
        assert_eq!((trimmed.width(), trimmed.height()), (3, 2));
        assert!(trimmed
            .row(0)
            .iter()
            .chain(trimmed.row(1))
            .all(|&p| p != BORDER));
    }

    #[test]
    fn removes_multiple_rings() {
        let trimmed = trim_borders(&bordered(2, 2, 4), 0);
        assert_eq!((trimmed.width(), trimmed.height()), (2, 2));
    }

    #[test]
    fn stops_at_non_uniform_ring() {
        let buffer = PixelBuffer::from_fn(4, 4, |x, y| Rgb::new((x + y) as u8, 0, 0));
        let trimmed = trim_borders(&buffer, 0);
        assert_eq!((trimmed.width(), trimmed.height()), (4, 4));
        assert_eq!(trimmed, buffer);
    }

    #[test]
    fn uniform_buffer_collapses_to_single_pixel() {
        let buffer = PixelBuffer::from_fn(7, 5, |_, _| INK);
        let trimmed = trim_borders(&buffer, 0);
        assert_eq!((trimmed.width(), trimmed.height()), (1, 1));
        assert_eq!(trimmed.pixel(0, 0), INK);
    }

    #[test]
    fn single_pixel_stays_put() {
        let buffer = PixelBuffer::new(1, 1);
        assert_eq!(trim_borders(&buffer, 3).width(), 1);
    }

    #[test]
    fn pre_crop_strips_before_inspecting() {
        // Uneven outer noise that auto-trim alone cannot remove.
        let buffer = PixelBuffer::from_fn(8, 8, |x, y| {
            let edge = x == 0 || y == 0 || x == 7 || y == 7;
            if edge {
                Rgb::new((x * 31 + y) as u8, 0, 0)
            } else if x >= 3 && x < 5 && y >= 3 && y < 5 {
                Rgb::new(x as u8, y as u8, 99)
            } else {
                BORDER
            }
        });
        let trimmed = trim_borders(&buffer, 1);
        assert_eq!((trimmed.width(), trimmed.height()), (2, 2));
        assert_eq!(trimmed.pixel(0, 0), Rgb::new(3, 3, 99));
    }

    #[test]
    fn pre_crop_is_clamped_to_keep_a_pixel() {
        let buffer = PixelBuffer::from_fn(4, 3, |x, _| Rgb::new(x as u8, 0, 0));
        let trimmed = trim_borders(&buffer, 50);
        assert!(trimmed.width() >= 1 && trimmed.height() >= 1);
    }
}
