use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::{Rgb, RgbImage};

/// Height of one rendered text line before downsampling.
pub const GLYPH_HEIGHT_PX: u32 = 54;
/// Source pixels per LED cell along each axis.
pub const DOWNSAMPLE_RATIO: u32 = 6;
/// LED rows produced per text line (`GLYPH_HEIGHT_PX / DOWNSAMPLE_RATIO`).
pub const ROWS_PER_LINE: u32 = GLYPH_HEIGHT_PX / DOWNSAMPLE_RATIO;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Coverage mask for one line of text, `height` rows of `width` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBitmap {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl LineBitmap {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: vec![0; (width * height) as usize],
        }
    }

    pub fn coverage_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.coverage[(y * self.width + x) as usize]
    }
}

/// Glyph measurement and rasterization. The pipeline only needs one line at a
/// time at a fixed pixel height.
pub trait GlyphSource {
    fn render_line(&self, line: &str, height_px: u32) -> Result<LineBitmap>;
}

pub struct FontdueGlyphs {
    font: Font,
    name: String,
}

impl fmt::Debug for FontdueGlyphs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontdueGlyphs")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FontdueGlyphs {
    pub fn from_path(font_path: &Path) -> Result<Self> {
        let font_bytes = std::fs::read(font_path)
            .with_context(|| format!("failed to read font file {}", font_path.display()))?;
        Self::from_bytes(font_bytes, &font_path.display().to_string())
    }

    pub fn from_bytes(font_bytes: Vec<u8>, name: &str) -> Result<Self> {
        let font = Font::from_bytes(font_bytes, FontSettings::default())
            .map_err(|error| anyhow!("failed to parse font {name}: {error}"))?;
        Ok(Self {
            font,
            name: name.to_owned(),
        })
    }

    pub fn missing_glyphs(&self, text: &str) -> Vec<char> {
        text.chars()
            .filter(|ch| !ch.is_whitespace())
            .filter(|ch| self.font.lookup_glyph_index(*ch) == 0)
            .collect()
    }
}

impl GlyphSource for FontdueGlyphs {
    fn render_line(&self, line: &str, height_px: u32) -> Result<LineBitmap> {
        let px = height_px as f32;
        let missing = self.missing_glyphs(line);
        if !missing.is_empty() {
            tracing::warn!(font = %self.name, ?missing, "font has no glyph for some characters");
        }

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.font], &TextStyle::new(line, px, 0));

        let advance: f32 = line
            .chars()
            .map(|ch| self.font.metrics(ch, px).advance_width)
            .sum();
        let ink_right = layout
            .glyphs()
            .iter()
            .map(|glyph| glyph.x + glyph.width as f32)
            .fold(0.0_f32, f32::max);
        let width = advance.max(ink_right).ceil().max(1.0) as u32;

        let mut bitmap = LineBitmap::blank(width, height_px);
        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, mask) = self.font.rasterize_config(glyph.key);
            let origin_x = glyph.x.round() as i32;
            let origin_y = glyph.y.round() as i32;
            for row in 0..glyph.height {
                let y = origin_y + row as i32;
                if y < 0 || y >= height_px as i32 {
                    continue;
                }
                for col in 0..glyph.width {
                    let x = origin_x + col as i32;
                    if x < 0 || x >= width as i32 {
                        continue;
                    }
                    let value = mask[row * glyph.width + col];
                    let index = (y as u32 * width + x as u32) as usize;
                    bitmap.coverage[index] = bitmap.coverage[index].max(value);
                }
            }
        }
        Ok(bitmap)
    }
}

pub struct TextRasterizer<'a> {
    glyphs: &'a dyn GlyphSource,
}

impl<'a> TextRasterizer<'a> {
    pub fn new(glyphs: &'a dyn GlyphSource) -> Self {
        Self { glyphs }
    }

    /// Black-on-white text, one 54px band per line. Empty text renders as a
    /// single space.
    pub fn render_source(&self, text: &str) -> Result<RgbImage> {
        let text = if text.is_empty() { " " } else { text };
        let lines = split_lines(text);
        let bitmaps = lines
            .iter()
            .map(|line| self.glyphs.render_line(line, GLYPH_HEIGHT_PX))
            .collect::<Result<Vec<_>>>()?;

        let width = bitmaps.iter().map(|bitmap| bitmap.width).max().unwrap_or(1).max(1);
        let height = GLYPH_HEIGHT_PX * lines.len() as u32;
        let mut source = RgbImage::from_pixel(width, height, WHITE);

        for (line_index, bitmap) in bitmaps.iter().enumerate() {
            let top = line_index as u32 * GLYPH_HEIGHT_PX;
            for y in 0..bitmap.height.min(GLYPH_HEIGHT_PX) {
                for x in 0..bitmap.width {
                    let coverage = bitmap.coverage_at(x, y);
                    if coverage > 0 {
                        let shade = 255 - coverage;
                        source.put_pixel(x, top + y, Rgb([shade, shade, shade]));
                    }
                }
            }
        }
        Ok(source)
    }

    pub fn rasterize(&self, text: &str) -> Result<RgbImage> {
        let source = self.render_source(text)?;
        Ok(downsample(&source, target_height(&source)))
    }
}

pub fn target_height(source: &RgbImage) -> u32 {
    (source.height() / GLYPH_HEIGHT_PX).max(1) * ROWS_PER_LINE
}

/// Reduces a rendered text band to LED resolution by sampling the centre of
/// each 6x6 block. Pure white is off; every other shade is on.
pub fn downsample(source: &RgbImage, target_height: u32) -> RgbImage {
    let (source_width, source_height) = source.dimensions();
    let target_width = if source_height == 0 {
        0
    } else {
        (u64::from(source_width) * u64::from(target_height) / u64::from(source_height)) as u32
    };

    let mut target = RgbImage::from_pixel(target_width, target_height, WHITE);
    let half = DOWNSAMPLE_RATIO / 2;
    for y in 0..target_height {
        for x in 0..target_width {
            let sample_x = x * DOWNSAMPLE_RATIO + half;
            let sample_y = y * DOWNSAMPLE_RATIO + half;
            if sample_x >= source_width || sample_y >= source_height {
                continue;
            }
            if *source.get_pixel(sample_x, sample_y) != WHITE {
                target.put_pixel(x, y, BLACK);
            }
        }
    }
    target
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::BlockGlyphs;

    #[test]
    fn two_blocks_downsample_to_eleven_columns_of_nine_rows() {
        let glyphs = BlockGlyphs { advance: 33 };
        let raster = TextRasterizer::new(&glyphs).rasterize("12").unwrap();
        assert_eq!(raster.dimensions(), (11, 9));
        // Gutter columns stay off; block centres are on.
        assert_eq!(*raster.get_pixel(0, 4), WHITE);
        assert_eq!(*raster.get_pixel(2, 4), BLACK);
        assert_eq!(*raster.get_pixel(2, 0), WHITE);
    }

    #[test]
    fn empty_text_renders_like_a_space() {
        let glyphs = BlockGlyphs { advance: 30 };
        let rasterizer = TextRasterizer::new(&glyphs);
        let empty = rasterizer.rasterize("").unwrap();
        let space = rasterizer.rasterize(" ").unwrap();
        assert_eq!(empty, space);
        assert_eq!(empty.dimensions(), (5, 9));
        assert!(empty.pixels().all(|pixel| *pixel == WHITE));
    }

    #[test]
    fn each_line_adds_nine_rows() {
        let glyphs = BlockGlyphs { advance: 30 };
        let rasterizer = TextRasterizer::new(&glyphs);
        let source = rasterizer.render_source("ab\nc\r\nd").unwrap();
        assert_eq!(source.dimensions(), (60, 162));
        let raster = rasterizer.rasterize("ab\nc\r\nd").unwrap();
        assert_eq!(raster.dimensions(), (10, 27));
        // Second line only has one glyph.
        assert_eq!(*raster.get_pixel(7, 13), WHITE);
        assert_eq!(*raster.get_pixel(2, 13), BLACK);
    }

    #[test]
    fn downsample_samples_block_centres_not_averages() {
        let mut source = RgbImage::from_pixel(12, 6, WHITE);
        // A single grey pixel at the centre of the first block turns it on.
        source.put_pixel(3, 3, Rgb([250, 250, 250]));
        // A dark pixel off-centre in the second block is ignored.
        source.put_pixel(7, 1, BLACK);
        let target = downsample(&source, 1);
        assert_eq!(target.dimensions(), (2, 1));
        assert_eq!(*target.get_pixel(0, 0), BLACK);
        assert_eq!(*target.get_pixel(1, 0), WHITE);
    }

    #[test]
    fn downsample_truncates_width() {
        let source = RgbImage::from_pixel(59, 54, WHITE);
        assert_eq!(downsample(&source, 9).width(), 9);
    }
}
