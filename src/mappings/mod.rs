pub mod text;

pub use text::{text_to_strokes, Stroke};
