use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frame, Frames, ImageDecoder, ImageFormat, ImageReader, RgbImage, RgbaImage};

use crate::error_codes::LedError;

/// Still image input for an image fragment.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Decoded(DynamicImage),
}

impl ImageSource {
    pub fn load(self) -> Result<DynamicImage> {
        match self {
            Self::Path(path) => {
                let reader = ImageReader::open(&path)
                    .with_context(|| format!("failed to open image {}", path.display()))?
                    .with_guessed_format()
                    .with_context(|| format!("failed to read image {}", path.display()))?;
                if reader.format().is_none() {
                    return Err(LedError::type_mismatch(format!(
                        "Wrong type: {} is not a recognized image",
                        path.display()
                    ))
                    .into());
                }
                reader
                    .decode()
                    .with_context(|| format!("failed to decode image {}", path.display()))
            }
            Self::Bytes(bytes) => {
                if image::guess_format(&bytes).is_err() {
                    return Err(
                        LedError::type_mismatch("Wrong type: buffer is not a recognized image").into(),
                    );
                }
                image::load_from_memory(&bytes).context("failed to decode image buffer")
            }
            Self::Decoded(image) => Ok(image),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(image: RgbaImage) -> Self {
        Self::Decoded(DynamicImage::ImageRgba8(image))
    }
}

impl From<RgbImage> for ImageSource {
    fn from(image: RgbImage) -> Self {
        Self::Decoded(DynamicImage::ImageRgb8(image))
    }
}

/// Animated input for a GIF fragment or [`crate::Document::open`].
#[derive(Clone)]
pub enum GifSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    /// Frames that were already decoded, in display order.
    Frames(Vec<Frame>),
}

impl fmt::Debug for GifSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Frames(frames) => write!(f, "Frames({} frames)", frames.len()),
        }
    }
}

impl From<PathBuf> for GifSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for GifSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for GifSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for GifSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<Frame>> for GifSource {
    fn from(frames: Vec<Frame>) -> Self {
        Self::Frames(frames)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFrame {
    pub image: RgbaImage,
    pub duration_ms: u32,
}

impl From<Frame> for ExtractedFrame {
    fn from(frame: Frame) -> Self {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let duration_ms = if denom == 0 { 0 } else { (numer + denom / 2) / denom };
        Self {
            image: frame.into_buffer(),
            duration_ms,
        }
    }
}

/// Lazily decoded GIF frames, keeping every `speed`-th one. Ends when the
/// decoder runs out of frames.
pub struct GifFrames {
    width: u32,
    height: u32,
    frames: Frames<'static>,
    speed: usize,
    index: usize,
}

impl GifFrames {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Iterator for GifFrames {
    type Item = Result<ExtractedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let decoded = self.frames.next()?;
            let index = self.index;
            self.index += 1;
            let frame = match decoded {
                Ok(frame) => frame,
                Err(error) => {
                    return Some(
                        Err(error).with_context(|| format!("failed to decode gif frame {index}")),
                    )
                }
            };
            if index % self.speed != 0 {
                continue;
            }
            return Some(Ok(ExtractedFrame::from(frame)));
        }
    }
}

pub fn extract_gif_frames(source: impl Into<GifSource>, speed: u32) -> Result<GifFrames> {
    if speed < 1 {
        return Err(LedError::invalid_argument(format!("speed must be >= 1, got {speed}")).into());
    }

    let (width, height, frames) = match source.into() {
        GifSource::Path(path) => {
            let reader = ImageReader::open(&path)
                .with_context(|| format!("failed to open gif {}", path.display()))?
                .with_guessed_format()
                .with_context(|| format!("failed to read gif {}", path.display()))?;
            if reader.format() != Some(ImageFormat::Gif) {
                return Err(LedError::type_mismatch(format!(
                    "Wrong type: {} is not a gif",
                    path.display()
                ))
                .into());
            }
            let file = File::open(&path)
                .with_context(|| format!("failed to open gif {}", path.display()))?;
            let decoder = GifDecoder::new(BufReader::new(file))
                .with_context(|| format!("failed to decode gif {}", path.display()))?;
            let (width, height) = decoder.dimensions();
            (width, height, decoder.into_frames())
        }
        GifSource::Bytes(bytes) => {
            if !matches!(image::guess_format(&bytes), Ok(ImageFormat::Gif)) {
                return Err(LedError::type_mismatch("Wrong type: buffer is not a gif").into());
            }
            let decoder =
                GifDecoder::new(Cursor::new(bytes)).context("failed to decode gif buffer")?;
            let (width, height) = decoder.dimensions();
            (width, height, decoder.into_frames())
        }
        GifSource::Frames(frames) => {
            let (width, height) = frames
                .first()
                .map(|frame| frame.buffer().dimensions())
                .unwrap_or((0, 0));
            let iter: Box<dyn Iterator<Item = image::ImageResult<Frame>>> =
                Box::new(frames.into_iter().map(Ok));
            (width, height, Frames::new(iter))
        }
    };

    Ok(GifFrames {
        width,
        height,
        frames,
        speed: speed as usize,
        index: 0,
    })
}

#[cfg(test)]
mod tests {
    use image::{Delay, Rgba};

    use super::*;
    use crate::error_codes::{find_led_error, ErrorCode};

    fn solid_frame(shade: u8, delay_ms: u32) -> Frame {
        Frame::from_parts(
            RgbaImage::from_pixel(4, 3, Rgba([shade, shade, shade, 255])),
            0,
            0,
            Delay::from_numer_denom_ms(delay_ms, 1),
        )
    }

    #[test]
    fn speed_keeps_every_nth_frame_starting_at_zero() {
        let frames = (0..7).map(|index| solid_frame(index * 10, 20)).collect::<Vec<_>>();
        let extracted = extract_gif_frames(frames, 3)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let shades = extracted
            .iter()
            .map(|frame| frame.image.get_pixel(0, 0).0[0])
            .collect::<Vec<_>>();
        assert_eq!(shades, vec![0, 30, 60]);
        assert!(extracted.iter().all(|frame| frame.duration_ms == 20));
    }

    #[test]
    fn decoded_frames_report_first_frame_dimensions() {
        let frames = extract_gif_frames(vec![solid_frame(0, 50)], 1).unwrap();
        assert_eq!(frames.dimensions(), (4, 3));
    }

    #[test]
    fn non_gif_bytes_are_a_type_mismatch() {
        let Err(error) = extract_gif_frames(b"definitely not a gif".to_vec(), 1) else {
            panic!("garbage bytes should not decode");
        };
        assert_eq!(find_led_error(&error).unwrap().code, ErrorCode::TypeMismatch);

        let error = ImageSource::from(b"nor an image".to_vec()).load().unwrap_err();
        assert_eq!(find_led_error(&error).unwrap().code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn gif_sources_debug_without_dumping_contents() {
        assert_eq!(
            format!("{:?}", GifSource::from(vec![0_u8; 12])),
            "Bytes(12 bytes)"
        );
        assert_eq!(
            format!("{:?}", GifSource::from(vec![solid_frame(0, 50), solid_frame(1, 50)])),
            "Frames(2 frames)"
        );
        assert_eq!(
            format!("{:?}", GifSource::from("clip.gif")),
            "Path(\"clip.gif\")"
        );
    }

    #[test]
    fn zero_speed_is_rejected() {
        let Err(error) = extract_gif_frames(vec![solid_frame(0, 50)], 0) else {
            panic!("speed 0 should be rejected");
        };
        assert_eq!(find_led_error(&error).unwrap().code, ErrorCode::InvalidArgument);
    }
}
