pub mod docstring;
pub mod engine;
pub mod entity_path;
pub mod exclusion;
