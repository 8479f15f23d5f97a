pub mod image_index;
pub mod macro_file;

pub use image_index::{content_hash, hash_file, ImageIndex, Resolution};
pub use macro_file::{LoadReport, MacroFile};
