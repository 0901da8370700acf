//! One LED frame: rounded border, inset background, glare lines and a
//! 2x2 "LED" with a highlight pixel per matrix cell.
//!
//! ```text
//! ┌─border──────────────────────────┐
//! │ ┌─background──────────────────┐ │
//! │ │  •pixels••••••─columns─•• │ │ │
//! │ │  •••••••••••••••••••••••• │ │ │
//! │ │  │row•••••••••••••••••••• │ │ │
//! │ │ ─glare────────────────────┘ │ │
//! │ └─────────────────────────────┘ │
//! └─────────────────────────────────┘
//! ```

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Transform};

use crate::schema::{Color, ColorConfig, MatrixSize};

const BORDER_RADIUS: f32 = 7.0;
const BACKGROUND_INSET: u32 = 5;
const FIRST_CELL_OFFSET: u32 = 7;
// Cubic control distance for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

/// Renders frames for one matrix size with the colors captured at
/// construction. Build a fresh grid whenever the palette may have changed.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    size: MatrixSize,
    colors: ColorConfig,
    chrome: RgbaImage,
}

impl PixelGrid {
    pub fn new(size: MatrixSize, colors: &ColorConfig) -> Result<Self> {
        let chrome = render_chrome(size, colors)?;
        Ok(Self {
            size,
            colors: colors.clone(),
            chrome,
        })
    }

    pub fn render<F>(&self, is_on: F) -> RgbaImage
    where
        F: Fn(u32, u32) -> bool,
    {
        let mut frame = self.chrome.clone();
        for column in 0..self.size.columns() {
            for row in 0..self.size.rows() {
                let (light, dark) = self.colors.cell_colors(is_on(column, row));
                paint_cell(&mut frame, column, row, light, dark);
            }
        }
        frame
    }

    pub fn render_blank(&self) -> RgbaImage {
        self.render(|_, _| false)
    }
}

/// Top-left pixel of the 2x2 block that draws `(column, row)`.
pub fn cell_origin(column: u32, row: u32) -> (u32, u32) {
    (FIRST_CELL_OFFSET + 3 * column, FIRST_CELL_OFFSET + 3 * row)
}

fn paint_cell(frame: &mut RgbaImage, column: u32, row: u32, light: Color, dark: Color) {
    let (x, y) = cell_origin(column, row);
    let dark = Rgba(dark.to_rgba());
    for dy in 0..2 {
        for dx in 0..2 {
            frame.put_pixel(x + dx, y + dy, dark);
        }
    }
    frame.put_pixel(x, y, Rgba(light.to_rgba()));
}

fn render_chrome(size: MatrixSize, colors: &ColorConfig) -> Result<RgbaImage> {
    let (width, height) = size.pixel_dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate LED frame pixmap {}x{}", width, height))?;

    let border = rounded_rect_path(width as f32, height as f32, BORDER_RADIUS)
        .ok_or_else(|| anyhow!("failed to build border path for {}x{}", width, height))?;
    pixmap.fill_path(
        &border,
        &solid_paint(colors.border),
        FillRule::Winding,
        Transform::identity(),
        None,
    );

    // Background spans [5, w-6] inclusive, leaving the trailing edge one pixel
    // thicker than the leading edge.
    let inner_width = width - 2 * BACKGROUND_INSET;
    let inner_height = height - 2 * BACKGROUND_INSET;
    fill_pixels(
        &mut pixmap,
        BACKGROUND_INSET,
        BACKGROUND_INSET,
        inner_width,
        inner_height,
        colors.background,
    )?;

    // glare
    fill_pixels(&mut pixmap, 6, height - 6, width - 12, 1, colors.glare)?;
    fill_pixels(&mut pixmap, width - 6, 6, 1, height - 12, colors.glare)?;

    Ok(pixmap_to_rgba(&pixmap))
}

fn fill_pixels(
    pixmap: &mut Pixmap,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: Color,
) -> Result<()> {
    let rect = Rect::from_xywh(x as f32, y as f32, width as f32, height as f32)
        .ok_or_else(|| anyhow!("invalid fill rect {}x{} at ({}, {})", width, height, x, y))?;
    pixmap.fill_rect(rect, &solid_paint(color), Transform::identity(), None);
    Ok(())
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = false;
    paint
}

fn rounded_rect_path(width: f32, height: f32, radius: f32) -> Option<Path> {
    let radius = radius.min(width / 2.0).min(height / 2.0);
    let handle = radius * KAPPA;
    let mut builder = PathBuilder::new();
    builder.move_to(radius, 0.0);
    builder.line_to(width - radius, 0.0);
    builder.cubic_to(
        width - radius + handle,
        0.0,
        width,
        radius - handle,
        width,
        radius,
    );
    builder.line_to(width, height - radius);
    builder.cubic_to(
        width,
        height - radius + handle,
        width - radius + handle,
        height,
        width - radius,
        height,
    );
    builder.line_to(radius, height);
    builder.cubic_to(
        radius - handle,
        height,
        0.0,
        height - radius + handle,
        0.0,
        height - radius,
    );
    builder.line_to(0.0, radius);
    builder.cubic_to(0.0, radius - handle, radius - handle, 0.0, radius, 0.0);
    builder.close();
    builder.finish()
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, source) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = source.demultiply();
        *pixel = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}
