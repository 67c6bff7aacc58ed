//! Converter configuration – where the external binaries live and where
//! temporary and output files go.
//!
//! Loaded from a TOML file and/or the environment:
//!
//! ```toml
//! binary = "/usr/local/bin/wkhtmltopdf"
//! binary_convert = "/usr/bin/convert"
//! lib_path = "/opt/wkhtmltox/lib"
//! site_root = "/var/www/site/"
//! work_dir = "/var/www/var/htmltopdf"
//! timeout_secs = 300
//! ```
//!
//! Environment variables (`HTMLTOPDF_BINARY`, `HTMLTOPDF_CONVERT_BINARY`,
//! `HTMLTOPDF_LIB_PATH`, `HTMLTOPDF_SITE_ROOT`, `HTMLTOPDF_WORK_DIR`,
//! `HTMLTOPDF_TIMEOUT_SECS`) override file values.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default subprocess timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the HTML-to-PDF converter.
    pub binary: Option<PathBuf>,
    /// Path to the raster converter.
    pub binary_convert: Option<PathBuf>,
    /// Shared-library directory exported as `LD_LIBRARY_PATH` for the PDF
    /// converter.
    pub lib_path: Option<String>,
    /// Absolute site root that `/media/cache/` links are resolved against.
    pub site_root: String,
    /// Directory for temporary region HTML and produced artifacts.
    pub work_dir: PathBuf,
    /// Subprocess timeout; `0` waits forever.
    pub timeout_secs: u64,
    /// Leave region HTML files on disk when a conversion fails.
    pub keep_failed_inputs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary: None,
            binary_convert: None,
            lib_path: None,
            site_root: "/".to_string(),
            work_dir: env::temp_dir().join("htmltopdf"),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            keep_failed_inputs: false,
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&src)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Optional file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| env::var(key).ok()))
    }

    /// Apply `HTMLTOPDF_*` overrides using `lookup` as the variable source.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HTMLTOPDF_BINARY") {
            self.binary = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HTMLTOPDF_CONVERT_BINARY") {
            self.binary_convert = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HTMLTOPDF_LIB_PATH") {
            self.lib_path = Some(v);
        }
        if let Some(v) = lookup("HTMLTOPDF_SITE_ROOT") {
            self.site_root = v;
        }
        if let Some(v) = lookup("HTMLTOPDF_WORK_DIR") {
            self.work_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("HTMLTOPDF_TIMEOUT_SECS") {
            match v.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => log::warn!("Ignoring invalid HTMLTOPDF_TIMEOUT_SECS value {v:?}"),
            }
        }
        self
    }

    /// Shared-library override, trimmed; `None` when blank.
    pub fn lib_path(&self) -> Option<&str> {
        self.lib_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Site root with a guaranteed trailing slash.
    pub fn site_root(&self) -> String {
        if self.site_root.ends_with('/') {
            self.site_root.clone()
        } else {
            format!("{}/", self.site_root)
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
