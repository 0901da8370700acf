use anyhow::Result;
use image::RgbaImage;

use crate::error_codes::LedError;
use crate::schema::{Direction, MatrixSize, OnPixelRule};

/// Number of scroll positions before `speed` is applied. Never zero, so a
/// scene exactly the size of the matrix still yields one frame.
pub fn scroll_distance(scene_width: u32, scene_height: u32, size: MatrixSize, direction: Direction) -> u32 {
    let distance = match direction {
        Direction::Left | Direction::Right => scene_width.saturating_sub(size.columns()),
        Direction::Up | Direction::Down => scene_height.saturating_sub(size.rows()),
        Direction::None => 1,
    };
    distance.max(1)
}

/// Read offset into the scene for scroll step `step`. Right and down scroll
/// from the far edge back towards the origin, so their offsets can go
/// negative when the scene is smaller than the matrix.
pub fn window_offset(
    step: u32,
    scene_width: u32,
    scene_height: u32,
    size: MatrixSize,
    direction: Direction,
) -> (i64, i64) {
    let step = i64::from(step);
    match direction {
        Direction::Left => (step, 0),
        Direction::Right => (
            -(step + i64::from(size.columns()) - i64::from(scene_width)),
            0,
        ),
        Direction::Up => (0, step),
        Direction::Down => (
            0,
            -(step + i64::from(size.rows()) - i64::from(scene_height)),
        ),
        Direction::None => (0, 0),
    }
}

/// A scene plus everything needed to walk a matrix-sized window across it.
#[derive(Debug, Clone)]
pub struct ScrollWindows {
    scene: RgbaImage,
    size: MatrixSize,
    direction: Direction,
    speed: u32,
    rule: OnPixelRule,
}

impl ScrollWindows {
    pub fn new(
        scene: RgbaImage,
        size: MatrixSize,
        direction: Direction,
        speed: u32,
        rule: OnPixelRule,
    ) -> Result<Self> {
        if speed < 1 {
            return Err(LedError::invalid_argument(format!("speed must be >= 1, got {speed}")).into());
        }
        Ok(Self {
            scene,
            size,
            direction,
            speed,
            rule,
        })
    }

    pub fn distance(&self) -> u32 {
        scroll_distance(self.scene.width(), self.scene.height(), self.size, self.direction)
    }

    /// `ceil(distance / speed)`.
    pub fn frame_count(&self) -> usize {
        self.distance().div_ceil(self.speed) as usize
    }

    /// A fresh, forward-only walk over the window positions.
    pub fn windows(&self) -> impl Iterator<Item = Window<'_>> + '_ {
        (0..self.distance())
            .step_by(self.speed as usize)
            .map(move |step| Window {
                scene: &self.scene,
                offset: window_offset(
                    step,
                    self.scene.width(),
                    self.scene.height(),
                    self.size,
                    self.direction,
                ),
                rule: self.rule,
            })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    scene: &'a RgbaImage,
    offset: (i64, i64),
    rule: OnPixelRule,
}

impl Window<'_> {
    pub fn offset(&self) -> (i64, i64) {
        self.offset
    }

    /// Cells outside the scene are off.
    pub fn is_on(&self, column: u32, row: u32) -> bool {
        let x = i64::from(column) + self.offset.0;
        let y = i64::from(row) + self.offset.1;
        if x < 0 || y < 0 || x >= i64::from(self.scene.width()) || y >= i64::from(self.scene.height()) {
            return false;
        }
        self.rule.is_on(self.scene.get_pixel(x as u32, y as u32).0)
    }
}
