use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::canvas::TerminalCanvas;
use crate::pixel::PixelBuffer;

/// One frame handed to the playback loop: the pixels, how long the frame
/// holds the screen, and whether it closes a full cycle of its sequence.
pub struct FrameStep<'a> {
    pub pixels: &'a PixelBuffer,
    pub hold: Duration,
    pub ends_cycle: bool,
}

/// Anything that can feed frames to [`play`]: decoded animations, a video
/// stream, or a scrolling window. `None` means the sequence is over.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<FrameStep<'_>>;
}

/// Limits on one playback run. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Budget {
    pub duration: Option<Duration>,
    pub loops: Option<u32>,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Stopped,
    Cancelled,
}

/// Present frames until a budget runs out, the source ends, or the
/// cancellation flag latches.
///
/// Presentation deadlines accumulate by adding each frame's hold time to the
/// previous deadline (the first seeds from the loop start), so decode and
/// render latency never drifts the schedule. The flag is polled before every
/// frame; a sleep already in progress is allowed to finish. Sink errors
/// abort the run.
pub fn play<S, W>(
    source: &mut S,
    budget: &Budget,
    cancel: &AtomicBool,
    canvas: &mut TerminalCanvas<W>,
    x_offset: u32,
) -> io::Result<PlaybackOutcome>
where
    S: FrameSource + ?Sized,
    W: Write,
{
    let start = Instant::now();
    let deadline_end = budget.duration.map(|limit| start + limit);
    let mut loops_left = budget.loops;
    let mut frames_left = budget.max_frames;
    let mut presented = start;

    canvas.begin_image();
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(PlaybackOutcome::Cancelled);
        }
        // Duration is checked ahead of the count budgets so it wins when
        // both would trigger on the same iteration.
        if deadline_end.is_some_and(|end| Instant::now() >= end) {
            break;
        }
        if frames_left == Some(0) || loops_left == Some(0) {
            break;
        }

        let Some(step) = source.next_frame() else {
            break;
        };
        canvas.send(step.pixels, x_offset)?;

        if step.ends_cycle {
            loops_left = loops_left.map(|n| n.saturating_sub(1));
        }
        frames_left = frames_left.map(|n| n.saturating_sub(1));

        presented += step.hold;
        let target = match deadline_end {
            Some(end) => presented.min(end),
            None => presented,
        };
        sleep_until(target);
    }

    canvas.end_image()?;
    Ok(PlaybackOutcome::Stopped)
}

/// Block until the absolute target instant; re-deriving the wait from the
/// target keeps oversleep from accumulating across frames.
pub fn sleep_until(target: Instant) {
    let now = Instant::now();
    if target > now {
        thread::sleep(target - now);
    }
}
