//! Multi-file configuration loading.

use std::path::{Path, PathBuf};

use snafu::prelude::*;

use crate::config::{ConfigPath, interpolate, is_yaml_file};
use crate::error::{ConfigError, ReadDirSnafu, ReadFileSnafu};

/// An interpolated YAML document and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlDocument {
    pub path: PathBuf,
    pub text: String,
}

impl YamlDocument {
    /// Parse the document, attributing failures to its source path.
    pub fn parse<T>(&self) -> Result<T, String>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_yaml::from_str(&self.text).map_err(|e| format!("{}: {e}", self.path.display()))
    }
}

/// Read every document reachable from `paths`, in order.
///
/// Directories contribute their YAML files sorted by name. All problems are
/// collected so a broken deployment reports every bad file at once.
pub fn load_documents(paths: &[ConfigPath]) -> Result<Vec<YamlDocument>, ConfigError> {
    let mut documents = Vec::new();
    let mut errors = Vec::new();

    for path in paths {
        let files = match path {
            ConfigPath::File(file) => Ok(vec![file.clone()]),
            ConfigPath::Dir(dir) => yaml_files_in(dir),
        };

        match files {
            Ok(files) => {
                for file in files {
                    match load_file(&file) {
                        Ok(doc) => documents.push(doc),
                        Err(e) => errors.push(format!("{}: {e}", file.display())),
                    }
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(documents)
}

fn load_file(path: &Path) -> Result<YamlDocument, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    let text = interpolate(&raw).map_err(|errors| ConfigError::EnvInterpolation {
        message: errors.join("\n"),
    })?;

    Ok(YamlDocument {
        path: path.to_path_buf(),
        text,
    })
}

fn yaml_files_in(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .context(ReadDirSnafu { path: dir })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_yaml_file(path))
        .collect();

    files.sort();
    Ok(files)
}
