//! Deterministic glyphs for tests that should not depend on a font file.

use std::sync::Arc;

use anyhow::Result;

use crate::text_raster::{GlyphSource, LineBitmap};

/// Each non-space character is a solid block `advance` pixels wide with a 6px
/// gutter on every side, so one character downsamples to `advance / 6` cells.
#[derive(Debug, Clone, Copy)]
pub struct BlockGlyphs {
    pub advance: u32,
}

impl GlyphSource for BlockGlyphs {
    fn render_line(&self, line: &str, height_px: u32) -> Result<LineBitmap> {
        let count = line.chars().count() as u32;
        let mut bitmap = LineBitmap::blank((count * self.advance).max(1), height_px);
        for (index, ch) in line.chars().enumerate() {
            if ch == ' ' {
                continue;
            }
            let left = index as u32 * self.advance;
            for y in 6..height_px.saturating_sub(6) {
                for x in left + 6..(left + self.advance).saturating_sub(6) {
                    bitmap.coverage[(y * bitmap.width + x) as usize] = 255;
                }
            }
        }
        Ok(bitmap)
    }
}

/// Block glyphs 33px wide: "12" rasterizes to 11 columns by 9 rows.
pub fn block_font() -> Arc<dyn GlyphSource> {
    Arc::new(BlockGlyphs { advance: 33 })
}
