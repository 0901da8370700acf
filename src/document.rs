use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::{RgbImage, RgbaImage};

use crate::debug_snapshots::{DebugSnapshots, SnapshotStage};
use crate::decoding::{extract_gif_frames, GifSource, ImageSource};
use crate::encoding::{encode_gif, read_loop_count, NoProgress, ProgressSink};
use crate::error_codes::LedError;
use crate::fragment::{Durations, Fragment, FrameSource};
use crate::layout;
use crate::pixel_grid::PixelGrid;
use crate::schema::{ColorConfig, Direction, MatrixSize, OnPixelRule};
use crate::scroll::ScrollWindows;
use crate::text_raster::{downsample, target_height, GlyphSource, TextRasterizer};

pub const DEFAULT_COLUMNS: u32 = 79;
pub const DEFAULT_ROWS: u32 = 9;
pub const DEFAULT_DURATION_MS: u32 = 20;

/// Construction parameters; validated by [`Document::new`].
#[derive(Clone)]
pub struct DocumentConfig {
    pub columns: u32,
    pub rows: u32,
    /// GIF loop count, `0` loops forever. Negative values are rejected.
    pub loop_count: i32,
    pub colors: ColorConfig,
    pub on_pixel_rule: OnPixelRule,
    /// Font used by text fragments that do not bring their own.
    pub font: Option<Arc<dyn GlyphSource>>,
    pub save_path: Option<PathBuf>,
    pub debug_template: Option<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            loop_count: 0,
            colors: ColorConfig::default(),
            on_pixel_rule: OnPixelRule::default(),
            font: None,
            save_path: None,
            debug_template: None,
        }
    }
}

#[derive(Clone)]
pub struct TextOptions {
    /// Overrides the document font for this fragment.
    pub font: Option<Arc<dyn GlyphSource>>,
    pub duration: u32,
    pub speed: u32,
    pub intro: bool,
    pub outro: bool,
    pub direction: Direction,
    pub repeat: u32,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            font: None,
            duration: DEFAULT_DURATION_MS,
            speed: 1,
            intro: true,
            outro: true,
            direction: Direction::Left,
            repeat: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub duration: u32,
    pub speed: u32,
    pub direction: Direction,
    pub repeat: u32,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION_MS,
            speed: 1,
            direction: Direction::Left,
            repeat: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    /// Replaces every embedded frame delay when set.
    pub duration: Option<u32>,
    pub speed: u32,
    pub repeat: u32,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            duration: None,
            speed: 1,
            repeat: 1,
        }
    }
}

pub enum SaveTarget<'a> {
    /// The document's configured save path.
    Configured,
    Path(&'a Path),
    Writer(&'a mut dyn Write),
}

/// An ordered list of fragments that is encoded into one looping GIF.
pub struct Document {
    size: MatrixSize,
    loop_count: u16,
    colors: ColorConfig,
    on_pixel_rule: OnPixelRule,
    font: Option<Arc<dyn GlyphSource>>,
    save_path: Option<PathBuf>,
    debug: Option<DebugSnapshots>,
    fragments: Vec<Fragment>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("size", &self.size)
            .field("loop_count", &self.loop_count)
            .field("colors", &self.colors)
            .field("save_path", &self.save_path)
            .field("fragments", &self.fragments.len())
            .finish_non_exhaustive()
    }
}

impl Document {
    pub fn new(config: DocumentConfig) -> Result<Self> {
        let size = MatrixSize::new(config.columns, config.rows)?;
        let loop_count = validate_loop_count(config.loop_count)?;
        let debug = config
            .debug_template
            .map(DebugSnapshots::new)
            .transpose()?;

        Ok(Self {
            size,
            loop_count,
            colors: config.colors,
            on_pixel_rule: config.on_pixel_rule,
            font: config.font,
            save_path: config.save_path,
            debug,
            fragments: Vec::new(),
        })
    }

    pub fn with_size(columns: u32, rows: u32) -> Result<Self> {
        Self::new(DocumentConfig {
            columns,
            rows,
            ..DocumentConfig::default()
        })
    }

    /// Adopts an LED GIF: the matrix size is inferred from its pixel size and
    /// all of its frames become the first fragment.
    pub fn open(source: impl Into<GifSource>) -> Result<Self> {
        let source = match source.into() {
            GifSource::Path(path) => GifSource::Bytes(
                fs::read(&path).with_context(|| format!("failed to read gif {}", path.display()))?,
            ),
            other => other,
        };
        let (width, height) = extract_gif_frames(source.clone(), 1)?.dimensions();
        let loop_count = match &source {
            GifSource::Bytes(bytes) => read_loop_count(bytes)?,
            _ => 0,
        };
        let size = MatrixSize::from_pixels(width, height)?;
        let mut document = Self::new(DocumentConfig {
            columns: size.columns(),
            rows: size.rows(),
            loop_count: i32::from(loop_count),
            ..DocumentConfig::default()
        })?;
        document.add_gif_fragment(source, &GifOptions::default())?;
        Ok(document)
    }

    pub fn size(&self) -> MatrixSize {
        self.size
    }

    pub fn columns(&self) -> u32 {
        self.size.columns()
    }

    pub fn rows(&self) -> u32 {
        self.size.rows()
    }

    pub fn columns_pixels(&self) -> u32 {
        self.size.columns_pixels()
    }

    pub fn rows_pixels(&self) -> u32 {
        self.size.rows_pixels()
    }

    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    pub fn set_loop_count(&mut self, loop_count: i32) -> Result<()> {
        self.loop_count = validate_loop_count(loop_count)?;
        Ok(())
    }

    pub fn colors(&self) -> &ColorConfig {
        &self.colors
    }

    /// Palette edits apply to every frame rendered afterwards, including
    /// frames of fragments that were added before the edit.
    pub fn colors_mut(&mut self) -> &mut ColorConfig {
        &mut self.colors
    }

    pub fn on_pixel_rule(&self) -> OnPixelRule {
        self.on_pixel_rule
    }

    pub fn set_on_pixel_rule(&mut self, rule: OnPixelRule) {
        self.on_pixel_rule = rule;
    }

    pub fn set_default_font(&mut self, font: Option<Arc<dyn GlyphSource>>) {
        self.font = font;
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub fn set_save_path(&mut self, path: Option<PathBuf>) {
        self.save_path = path;
    }

    pub fn debug_template(&self) -> Option<&str> {
        self.debug.as_ref().map(DebugSnapshots::template)
    }

    pub fn set_debug_template(&mut self, template: Option<String>) -> Result<()> {
        self.debug = template.map(DebugSnapshots::new).transpose()?;
        Ok(())
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn frame_count(&self) -> usize {
        self.fragments.iter().map(Fragment::frame_count).sum()
    }

    /// Text at LED resolution: black cells on white, nine rows per line.
    pub fn text_raster(&self, text: &str, font: Option<&dyn GlyphSource>) -> Result<RgbImage> {
        let font = font.or(self.font.as_deref()).ok_or_else(|| {
            LedError::invalid_argument(
                "no font available: pass one with the fragment or configure a document font",
            )
        })?;
        let rasterizer = TextRasterizer::new(font);
        let source = rasterizer.render_source(text)?;
        self.snapshot(SnapshotStage::Source, &source)?;
        let raster = downsample(&source, target_height(&source));
        self.snapshot(SnapshotStage::Raster, &raster)?;
        Ok(raster)
    }

    /// Pads a raster into the scene a fragment scrolls across.
    pub fn compose_scene(
        &self,
        raster: &RgbImage,
        intro: bool,
        outro: bool,
        direction: Direction,
    ) -> Result<RgbaImage> {
        let scene = layout::compose(raster, self.size, intro, outro, direction);
        self.snapshot(SnapshotStage::Scene, &scene.image)?;
        Ok(scene.image)
    }

    pub fn add_text_fragment(&mut self, text: &str, options: &TextOptions) -> Result<usize> {
        validate_speed_and_repeat(options.speed, options.repeat)?;
        let raster = self.text_raster(text, options.font.as_deref())?;
        let scene = self.compose_scene(&raster, options.intro, options.outro, options.direction)?;
        self.push_scroll(
            scene,
            options.duration,
            options.speed,
            options.direction,
            options.repeat,
        )
    }

    /// Scrolls an image whose black pixels are lit cells. The image is in
    /// cell units and must be at least as large as the matrix.
    pub fn add_image_fragment(
        &mut self,
        source: impl Into<ImageSource>,
        options: &ImageOptions,
    ) -> Result<usize> {
        validate_speed_and_repeat(options.speed, options.repeat)?;
        let image = source.into().load()?.to_rgba8();
        let (width, height) = image.dimensions();
        if width < self.columns() || height < self.rows() {
            return Err(LedError::size_mismatch(format!(
                "The size of this image does not match the size of the current gif ({}, {}) < ({}, {})",
                width,
                height,
                self.columns(),
                self.rows()
            ))
            .into());
        }
        self.push_scroll(
            image,
            options.duration,
            options.speed,
            options.direction,
            options.repeat,
        )
    }

    /// Imports the frames of an LED GIF with exactly this document's pixel size.
    pub fn add_gif_fragment(
        &mut self,
        source: impl Into<GifSource>,
        options: &GifOptions,
    ) -> Result<usize> {
        validate_speed_and_repeat(options.speed, options.repeat)?;
        let frames = extract_gif_frames(source, options.speed)?;
        let expected = self.size.pixel_dimensions();
        if frames.dimensions() != expected {
            let (width, height) = frames.dimensions();
            return Err(LedError::size_mismatch(format!(
                "The size of this gif does not match the size of the current gif ({}, {}) != ({}, {})",
                width, height, expected.0, expected.1
            ))
            .into());
        }

        let mut images = Vec::new();
        let mut delays = Vec::new();
        for frame in frames {
            let frame = frame?;
            images.push(frame.image);
            delays.push(frame.duration_ms);
        }
        if images.is_empty() {
            return Err(LedError::empty_document("gif contains no frames").into());
        }

        let durations = match options.duration {
            Some(duration) => Durations::Fixed(duration),
            None => Durations::PerFrame(delays),
        };
        Ok(self.push(Fragment::new(
            FrameSource::Clip(images),
            durations,
            options.repeat,
        )))
    }

    pub fn remove_fragment(&mut self, index: usize) -> Result<Fragment> {
        if index >= self.fragments.len() {
            return Err(LedError::invalid_argument(format!(
                "fragment index {} out of range ({} fragments)",
                index,
                self.fragments.len()
            ))
            .into());
        }
        Ok(self.fragments.remove(index))
    }

    pub fn clear_fragments(&mut self) {
        self.fragments.clear();
    }

    /// Writes to the configured save path and clears the fragments.
    pub fn save(&mut self) -> Result<()> {
        self.save_with_progress(SaveTarget::Configured, &mut NoProgress)
    }

    pub fn save_to(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with_progress(SaveTarget::Path(path.as_ref()), &mut NoProgress)
    }

    pub fn save_to_writer(&mut self, writer: &mut dyn Write) -> Result<()> {
        self.save_with_progress(SaveTarget::Writer(writer), &mut NoProgress)
    }

    /// Encodes every fragment in order. On success the fragment list is
    /// emptied; on failure it is left untouched.
    pub fn save_with_progress(
        &mut self,
        target: SaveTarget<'_>,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let total = self.frame_count();
        if self.fragments.is_empty() || total == 0 {
            return Err(LedError::empty_document("You have not added any fragments.").into());
        }

        let bytes = match target {
            SaveTarget::Configured => {
                let path = self.save_path.clone().ok_or_else(|| {
                    LedError::empty_document("no output path: configure save_path or pass a target")
                })?;
                let bytes = self.encode(progress)?;
                write_file(&path, &bytes)?;
                bytes
            }
            SaveTarget::Path(path) => {
                let bytes = self.encode(progress)?;
                write_file(path, &bytes)?;
                bytes
            }
            SaveTarget::Writer(writer) => {
                let bytes = self.encode(progress)?;
                writer
                    .write_all(&bytes)
                    .context("failed to write gif to output")?;
                bytes
            }
        };

        tracing::info!(
            fragments = self.fragments.len(),
            frames = total,
            bytes = bytes.len(),
            loop_count = self.loop_count,
            "saved gif"
        );
        self.clear_fragments();
        Ok(())
    }

    /// Runs `body`, then saves no matter how `body` finished. Fails before
    /// running anything when no save path is configured. A failing body's
    /// error takes precedence over a failing save.
    pub fn autosave<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.save_path.is_none() {
            return Err(LedError::empty_document("autosave needs a save_path").into());
        }

        let outcome = body(self);
        let saved = self.save();
        match outcome {
            Ok(value) => saved.map(|()| value),
            Err(error) => {
                if let Err(save_error) = saved {
                    tracing::warn!(error = %save_error, "autosave after a failed body did not write");
                }
                Err(error)
            }
        }
    }

    fn encode(&self, progress: &mut dyn ProgressSink) -> Result<Vec<u8>> {
        let grid = PixelGrid::new(self.size, &self.colors)?;
        let delays = self
            .fragments
            .iter()
            .flat_map(Fragment::durations)
            .collect::<Vec<_>>();
        let frames = self
            .fragments
            .iter()
            .flat_map(|fragment| fragment.frames(&grid));
        encode_gif(frames, &delays, self.loop_count, progress)
    }

    fn push_scroll(
        &mut self,
        scene: RgbaImage,
        duration: u32,
        speed: u32,
        direction: Direction,
        repeat: u32,
    ) -> Result<usize> {
        let windows = ScrollWindows::new(scene, self.size, direction, speed, self.on_pixel_rule)?;
        Ok(self.push(Fragment::new(
            FrameSource::Scroll(windows),
            Durations::Fixed(duration),
            repeat,
        )))
    }

    fn push(&mut self, fragment: Fragment) -> usize {
        let index = self.fragments.len();
        tracing::debug!(
            index,
            frames = fragment.frame_count(),
            repeat = fragment.repeat(),
            "added fragment"
        );
        self.fragments.push(fragment);
        index
    }

    fn snapshot<P>(&self, stage: SnapshotStage, image: &image::ImageBuffer<P, Vec<u8>>) -> Result<()>
    where
        P: image::PixelWithColorType<Subpixel = u8>,
    {
        if let Some(debug) = &self.debug {
            debug.write(self.fragments.len(), stage, image)?;
        }
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write gif {}", path.display()))
}

fn validate_loop_count(loop_count: i32) -> Result<u16> {
    u16::try_from(loop_count).map_err(|_| {
        LedError::invalid_construction(format!(
            "loop must be between 0 and {}, got {}",
            u16::MAX,
            loop_count
        ))
        .into()
    })
}

fn validate_speed_and_repeat(speed: u32, repeat: u32) -> Result<()> {
    if speed < 1 {
        return Err(LedError::invalid_argument(format!("speed must be >= 1, got {speed}")).into());
    }
    if repeat < 1 {
        return Err(LedError::invalid_argument(format!("repeat must be >= 1, got {repeat}")).into());
    }
    Ok(())
}
