use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

/// Receives `(done, total)` once before the first frame and after each
/// encoded frame.
pub trait ProgressSink {
    fn on_progress(&mut self, done: usize, total: usize);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _done: usize, _total: usize) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize),
{
    fn on_progress(&mut self, done: usize, total: usize) {
        self(done, total)
    }
}

/// `0` loops forever; anything else is written as the GIF repeat count.
pub fn repeat_for_loop(loop_count: u16) -> Repeat {
    if loop_count == 0 {
        Repeat::Infinite
    } else {
        Repeat::Finite(loop_count)
    }
}

/// Encodes `frames` with the matching per-frame `delays_ms` into an animated
/// GIF held in memory. Delays are handed to the codec as milliseconds.
pub fn encode_gif<I>(
    frames: I,
    delays_ms: &[u32],
    loop_count: u16,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = RgbaImage>,
{
    let total = delays_ms.len();
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        encoder
            .set_repeat(repeat_for_loop(loop_count))
            .context("failed to write gif loop count")?;

        progress.on_progress(0, total);
        let mut written = 0;
        for (index, image) in frames.into_iter().enumerate() {
            let delay_ms = delays_ms
                .get(index)
                .copied()
                .ok_or_else(|| anyhow!("frame {index} has no delay ({total} delays supplied)"))?;
            let frame = Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1));
            encoder
                .encode_frame(frame)
                .with_context(|| format!("failed to encode gif frame {index}"))?;
            written += 1;
            progress.on_progress(written, total);
        }

        if written != total {
            return Err(anyhow!(
                "frame stream ended after {written} frames but {total} delays were supplied"
            ));
        }
    }
    Ok(bytes)
}

/// Loop count stored in the GIF's NETSCAPE2.0 extension, with `0` meaning
/// forever. A GIF without the extension also reads as `0`.
pub fn read_loop_count(gif: &[u8]) -> Result<u16> {
    let decoder = gif::DecodeOptions::new()
        .read_info(Cursor::new(gif))
        .context("failed to read gif header")?;
    Ok(match decoder.repeat() {
        gif::Repeat::Infinite => 0,
        gif::Repeat::Finite(count) => count,
    })
}
