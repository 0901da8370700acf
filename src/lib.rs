//! Faux LED-matrix animations: text, images and GIF clips scrolled across a
//! fixed grid of cells and encoded into one looping GIF.

pub mod debug_snapshots;
pub mod decoding;
pub mod document;
pub mod encoding;
pub mod error_codes;
pub mod fragment;
pub mod layout;
pub mod manifest;
pub mod pixel_grid;
pub mod schema;
pub mod scroll;
#[doc(hidden)]
pub mod test_support;
pub mod text_raster;

pub use decoding::{extract_gif_frames, ExtractedFrame, GifSource, ImageSource};
pub use document::{Document, DocumentConfig, GifOptions, ImageOptions, SaveTarget, TextOptions};
pub use encoding::{NoProgress, ProgressSink};
pub use error_codes::{find_led_error, ErrorCode, LedError};
pub use schema::{Color, ColorConfig, Direction, MatrixSize, OnPixelRule};
pub use text_raster::{FontdueGlyphs, GlyphSource, LineBitmap};
