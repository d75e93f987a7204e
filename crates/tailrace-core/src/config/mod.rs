//! Configuration sources, environment interpolation and document loading.
//!
//! Parsing into concrete config types is left to the crate that owns them;
//! this module only turns paths into interpolated YAML text.

mod loader;
mod path;
mod vars;

pub use loader::{YamlDocument, load_documents};
pub use path::{ConfigPath, is_yaml_file};
pub use vars::interpolate;
