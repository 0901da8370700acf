//! LED frame render benchmarks.
//! Run: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use ledgif::pixel_grid::PixelGrid;
use ledgif::scroll::ScrollWindows;
use ledgif::{ColorConfig, Direction, MatrixSize, OnPixelRule};

fn checkerboard_scene(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

fn bench_pixel_grid(c: &mut Criterion) {
    let size = MatrixSize::new(79, 9).expect("matrix size");
    let grid = PixelGrid::new(size, &ColorConfig::default()).expect("pixel grid");
    let windows = ScrollWindows::new(
        checkerboard_scene(79 * 3, 9),
        size,
        Direction::Left,
        1,
        OnPixelRule::RgbBlack,
    )
    .expect("scroll windows");

    let mut group = c.benchmark_group("render_frame");
    group.sample_size(50);

    group.bench_function("chrome_79x9", |b| {
        b.iter(|| black_box(PixelGrid::new(size, &ColorConfig::default()).expect("pixel grid")));
    });

    group.bench_function("blank_79x9", |b| {
        b.iter(|| black_box(grid.render_blank()));
    });

    group.bench_function("scroll_window_79x9", |b| {
        let window = windows.windows().nth(40).expect("window 40");
        b.iter(|| black_box(grid.render(|column, row| window.is_on(column, row))));
    });

    group.finish();
}

criterion_group!(benches, bench_pixel_grid);
criterion_main!(benches);
