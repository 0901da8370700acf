use image::RgbaImage;

use crate::pixel_grid::PixelGrid;
use crate::scroll::ScrollWindows;

/// Per-frame delays of one fragment cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durations {
    /// Same delay for every frame.
    Fixed(u32),
    /// One delay per frame of a single cycle.
    PerFrame(Vec<u32>),
}

#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Rendered on demand from a scene, with the palette current at render time.
    Scroll(ScrollWindows),
    /// Frames taken verbatim from an imported clip.
    Clip(Vec<RgbaImage>),
}

impl FrameSource {
    fn cycle_len(&self) -> usize {
        match self {
            Self::Scroll(windows) => windows.frame_count(),
            Self::Clip(frames) => frames.len(),
        }
    }

    /// One fresh pass over the frames of a single cycle.
    fn generate<'a>(&'a self, grid: &'a PixelGrid) -> Box<dyn Iterator<Item = RgbaImage> + 'a> {
        match self {
            Self::Scroll(windows) => Box::new(
                windows
                    .windows()
                    .map(move |window| grid.render(|column, row| window.is_on(column, row))),
            ),
            Self::Clip(frames) => Box::new(frames.iter().cloned()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    source: FrameSource,
    durations: Durations,
    repeat: u32,
}

impl Fragment {
    pub fn new(source: FrameSource, durations: Durations, repeat: u32) -> Self {
        Self {
            source,
            durations,
            repeat,
        }
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    pub fn cycle_len(&self) -> usize {
        self.source.cycle_len()
    }

    pub fn frame_count(&self) -> usize {
        self.cycle_len() * self.repeat as usize
    }

    /// Every frame of the fragment. Each repeat regenerates its cycle from the
    /// source instead of replaying earlier output.
    pub fn frames<'a>(&'a self, grid: &'a PixelGrid) -> impl Iterator<Item = RgbaImage> + 'a {
        (0..self.repeat).flat_map(move |_| self.source.generate(grid))
    }

    pub fn durations(&self) -> impl Iterator<Item = u32> + '_ {
        let cycle_len = self.cycle_len();
        (0..self.repeat).flat_map(move |_| self.cycle_durations(cycle_len))
    }

    fn cycle_durations(&self, cycle_len: usize) -> Box<dyn Iterator<Item = u32> + '_> {
        match &self.durations {
            Durations::Fixed(delay) => Box::new(std::iter::repeat(*delay).take(cycle_len)),
            Durations::PerFrame(delays) => Box::new(delays.iter().copied()),
        }
    }
}
