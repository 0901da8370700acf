use image::{imageops, DynamicImage, Rgba, RgbImage, RgbaImage};

use crate::schema::{Direction, MatrixSize};

/// Padded canvas a fragment scrolls across, plus where the raster landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub image: RgbaImage,
    pub paste_offset: (u32, u32),
}

/// Canvas size and paste offset for a `(raster_columns, raster_rows)` raster.
///
/// Intro padding places the content one matrix-width (or height) beyond the
/// entry edge; outro padding leaves one matrix beyond the exit edge. Content
/// narrower than the matrix is padded so it ends flush with the exit edge.
pub fn scene_geometry(
    raster_columns: u32,
    raster_rows: u32,
    size: MatrixSize,
    intro: bool,
    outro: bool,
    direction: Direction,
) -> ((u32, u32), (u32, u32)) {
    let columns = size.columns();
    let rows = size.rows();
    let (mut scene_columns, mut scene_rows) = (raster_columns, raster_rows);
    let (mut paste_column, mut paste_row) = (0, 0);

    match direction {
        Direction::Left => {
            if intro {
                scene_columns += columns;
                paste_column += columns;
            }
            if outro {
                scene_columns += columns;
            } else if raster_columns < columns {
                scene_columns += columns - raster_columns;
            }
        }
        Direction::Right => {
            if intro {
                scene_columns += columns;
            } else if raster_columns < columns {
                scene_columns += columns - raster_columns;
            }
            if outro {
                scene_columns += columns;
                paste_column += columns;
            } else if raster_columns < columns {
                scene_columns += columns - raster_columns;
                paste_column += columns - raster_columns;
            }
        }
        Direction::Up => {
            scene_columns = scene_columns.max(columns);
            if intro {
                scene_rows += rows;
                paste_row += rows;
            }
            if outro {
                scene_rows += rows;
            }
        }
        Direction::Down => {
            scene_columns = scene_columns.max(columns);
            if intro {
                scene_rows += rows;
            }
            if outro {
                scene_rows += rows;
                paste_row += rows;
            }
        }
        Direction::None => {}
    }

    (
        (scene_columns.max(columns), scene_rows.max(rows)),
        (paste_column, paste_row),
    )
}

/// Pastes a binary raster onto a white canvas sized for scrolling in
/// `direction`.
pub fn compose(
    raster: &RgbImage,
    size: MatrixSize,
    intro: bool,
    outro: bool,
    direction: Direction,
) -> Scene {
    let ((width, height), (paste_column, paste_row)) = scene_geometry(
        raster.width(),
        raster.height(),
        size,
        intro,
        outro,
        direction,
    );

    let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let raster = DynamicImage::ImageRgb8(raster.clone()).to_rgba8();
    imageops::replace(
        &mut image,
        &raster,
        i64::from(paste_column),
        i64::from(paste_row),
    );

    Scene {
        image,
        paste_offset: (paste_column, paste_row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(columns: u32, rows: u32) -> MatrixSize {
        MatrixSize::new(columns, rows).unwrap()
    }

    #[test]
    fn left_with_intro_and_outro_pads_a_matrix_each_side() {
        let geometry = scene_geometry(30, 9, size(10, 9), true, true, Direction::Left);
        assert_eq!(geometry, ((50, 9), (10, 0)));
    }

    #[test]
    fn left_without_outro_pads_short_text_up_to_the_matrix() {
        assert_eq!(
            scene_geometry(4, 9, size(10, 9), false, false, Direction::Left),
            ((10, 9), (0, 0))
        );
        assert_eq!(
            scene_geometry(4, 9, size(10, 9), true, false, Direction::Left),
            ((20, 9), (10, 0))
        );
    }

    #[test]
    fn right_pastes_after_the_outro_pad() {
        assert_eq!(
            scene_geometry(30, 9, size(10, 9), true, true, Direction::Right),
            ((50, 9), (10, 0))
        );
        assert_eq!(
            scene_geometry(30, 9, size(10, 9), true, false, Direction::Right),
            ((40, 9), (0, 0))
        );
    }

    #[test]
    fn right_without_outro_keeps_short_text_flush_right() {
        assert_eq!(
            scene_geometry(4, 9, size(10, 9), false, false, Direction::Right),
            ((16, 9), (6, 0))
        );
    }

    #[test]
    fn vertical_directions_pad_rows_and_widen_to_the_matrix() {
        assert_eq!(
            scene_geometry(4, 9, size(10, 9), true, true, Direction::Up),
            ((10, 27), (0, 9))
        );
        assert_eq!(
            scene_geometry(4, 9, size(10, 9), false, true, Direction::Down),
            ((10, 18), (0, 9))
        );
        assert_eq!(
            scene_geometry(40, 9, size(10, 9), true, false, Direction::Down),
            ((40, 18), (0, 0))
        );
    }

    #[test]
    fn none_only_clamps_to_the_matrix_on_both_axes() {
        assert_eq!(
            scene_geometry(4, 9, size(10, 20), true, true, Direction::None),
            ((10, 20), (0, 0))
        );
        assert_eq!(
            scene_geometry(40, 27, size(10, 9), true, true, Direction::None),
            ((40, 27), (0, 0))
        );
    }

    #[test]
    fn compose_pastes_raster_on_white() {
        let mut raster = RgbImage::from_pixel(2, 1, image::Rgb([255, 255, 255]));
        raster.put_pixel(1, 0, image::Rgb([0, 0, 0]));
        let scene = compose(&raster, size(3, 1), true, false, Direction::Left);
        assert_eq!(scene.image.dimensions(), (6, 1));
        assert_eq!(scene.paste_offset, (3, 0));
        let blacks = scene
            .image
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel.0 == [0, 0, 0, 255])
            .map(|(x, y, _)| (x, y))
            .collect::<Vec<_>>();
        assert_eq!(blacks, vec![(4, 0)]);
    }
}
