//! Small helpers shared across the engine.

mod fs;
mod plural;

pub use fs::{is_temp_file, normalize_path};
pub use plural::{plural_count, plural_s};
