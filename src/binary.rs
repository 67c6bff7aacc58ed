//! Converter binaries – resolution from [`Config`], executability and
//! version checks, and `PATH` discovery for unconfigured installs.
//!
//! The PDF generator check returns a [`PdfBinary`] carrying any extra CLI
//! flags the installed version needs; callers thread it into the document
//! instead of relying on process-wide state.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::command::CommandLine;
use crate::config::Config;
use crate::error::{BinaryKind, Error, Result};

/// Minimum supported PDF generator version, as reported to operators.
pub const REQUIRED_VERSION: &str = "0.12.4 (with patched qt)";

/// Needed from 0.12.6 on to let the converter read local HTML files.
pub const LOCAL_FILE_ACCESS_FLAG: &str = "--enable-local-file-access";

/// Default executable names searched by [`discover`].
pub const PDF_GENERATOR_NAME: &str = "wkhtmltopdf";
pub const CONVERT_NAME: &str = "convert";

static FALLBACK_DIRS: [&str; 2] = ["/usr/local/bin", "/usr/bin"];

/// Three-component converter version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Find the first `N.N[.N]` token in `-V` output such as
    /// `wkhtmltopdf 0.12.6 (with patched qt)`.
    pub fn parse(output: &str) -> Option<Self> {
        output.split_whitespace().find_map(|token| {
            let mut parts = token.split('.');
            let major = parts.next()?.parse().ok()?;
            let minor = parts.next()?.parse().ok()?;
            let patch = match parts.next() {
                Some(p) => p.parse().ok()?,
                None => 0,
            };
            Some(Self::new(major, minor, patch))
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Outcome of the version policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupport {
    Unsupported,
    Supported,
    /// Supported, but local HTML files need [`LOCAL_FILE_ACCESS_FLAG`].
    SupportedWithLocalFileAccess,
}

impl VersionSupport {
    pub fn classify(v: Version) -> Self {
        match (v.major, v.minor, v.patch) {
            (major, _, _) if major > 0 => Self::Supported,
            (0, minor, _) if minor > 12 => Self::Supported,
            (0, 12, patch) if patch >= 6 => Self::SupportedWithLocalFileAccess,
            (0, 12, patch) if patch >= 4 => Self::Supported,
            _ => Self::Unsupported,
        }
    }

    pub fn extra_args(self) -> Vec<String> {
        match self {
            Self::SupportedWithLocalFileAccess => vec![LOCAL_FILE_ACCESS_FLAG.to_string()],
            _ => Vec::new(),
        }
    }
}

/// A validated PDF generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfBinary {
    pub path: PathBuf,
    pub version: Version,
    /// Flags appended before the positional arguments of every conversion.
    pub extra_args: Vec<String>,
}

fn configured(path: Option<&Path>) -> Option<PathBuf> {
    let path = path?;
    match path.to_str().map(str::trim) {
        Some("") => None,
        Some(trimmed) => Some(PathBuf::from(trimmed)),
        None => Some(path.to_path_buf()),
    }
}

pub fn resolve_pdf_binary(config: &Config) -> Option<PathBuf> {
    configured(config.binary.as_deref())
}

pub fn resolve_convert_binary(config: &Config) -> Option<PathBuf> {
    configured(config.binary_convert.as_deref())
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn require_executable(kind: BinaryKind, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = path.ok_or(Error::BinaryMissing(kind))?;
    if !is_executable(&path) {
        return Err(Error::BinaryNotExecutable { kind, path });
    }
    Ok(path)
}

/// Validate the configured PDF generator and its version.
pub fn check_pdf_binary(config: &Config) -> Result<PdfBinary> {
    let kind = BinaryKind::PdfGenerator;
    let path = require_executable(kind, resolve_pdf_binary(config))?;

    let mut probe = CommandLine::new(&path);
    probe.arg("-V");
    let output = probe
        .run_captured(config.timeout())
        .map_err(|e| {
            log::warn!("Version probe `{probe}` failed: {e}");
            Error::BinaryNotExecutable {
                kind,
                path: path.clone(),
            }
        })?
        .stdout;

    let unsupported = |installed: String| Error::BinaryVersionUnsupported {
        installed,
        required: REQUIRED_VERSION.to_string(),
    };

    let version = match Version::parse(&output) {
        Some(v) => v,
        None => {
            let raw = output.trim();
            return Err(unsupported(if raw.is_empty() {
                "unknown".to_string()
            } else {
                raw.to_string()
            }));
        }
    };

    match VersionSupport::classify(version) {
        VersionSupport::Unsupported => Err(unsupported(version.to_string())),
        support => {
            log::debug!("PDF generator {} is version {version}", path.display());
            Ok(PdfBinary {
                path,
                version,
                extra_args: support.extra_args(),
            })
        }
    }
}

/// Validate the configured raster converter.
pub fn check_convert_binary(config: &Config) -> Result<PathBuf> {
    require_executable(BinaryKind::Convert, resolve_convert_binary(config))
}

/// Look for an executable called `name` on `PATH`, then in the usual
/// install locations.
pub fn discover(name: &str) -> Option<PathBuf> {
    let path_dirs = env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();
    let fallback = FALLBACK_DIRS.iter().map(|d| Path::new(*d));
    discover_in(name, path_dirs.iter().map(PathBuf::as_path).chain(fallback))
}

fn discover_in<'a, I>(name: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = &'a Path>,
{
    dirs.into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Fill unset binary paths in `config` by [`discover`]ing the default
/// executables.
pub fn fill_discovered(config: &mut Config) {
    if resolve_pdf_binary(config).is_none() {
        config.binary = discover(PDF_GENERATOR_NAME);
        if let Some(p) = &config.binary {
            log::info!("Discovered PDF generator at {}", p.display());
        }
    }
    if resolve_convert_binary(config).is_none() {
        config.binary_convert = discover(CONVERT_NAME);
        if let Some(p) = &config.binary_convert {
            log::info!("Discovered image converter at {}", p.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(s: &str) -> VersionSupport {
        VersionSupport::classify(Version::parse(s).unwrap())
    }

    #[test]
    fn version_boundaries() {
        assert_eq!(classify("0.12.3"), VersionSupport::Unsupported);
        assert_eq!(classify("0.12.4"), VersionSupport::Supported);
        assert_eq!(classify("0.12.5"), VersionSupport::Supported);
        assert_eq!(classify("0.12.6"), VersionSupport::SupportedWithLocalFileAccess);
        assert_eq!(classify("0.13.0"), VersionSupport::Supported);
        assert_eq!(classify("1.0.0"), VersionSupport::Supported);
        assert_eq!(classify("0.11.9"), VersionSupport::Unsupported);
    }

    #[test]
    fn only_0_12_6_and_later_patches_add_flag() {
        assert_eq!(
            classify("0.12.6").extra_args(),
            vec![LOCAL_FILE_ACCESS_FLAG.to_string()]
        );
        assert!(classify("0.12.4").extra_args().is_empty());
        assert!(classify("0.13.0").extra_args().is_empty());
    }

    #[test]
    fn parse_version_output() {
        assert_eq!(
            Version::parse("wkhtmltopdf 0.12.6 (with patched qt)"),
            Some(Version::new(0, 12, 6))
        );
        assert_eq!(Version::parse("wkhtmltopdf 0.13"), Some(Version::new(0, 13, 0)));
        assert_eq!(Version::parse("no version here"), None);
    }

    #[test]
    fn blank_config_paths_resolve_to_none() {
        let config = Config {
            binary: Some(PathBuf::from("   ")),
            binary_convert: None,
            ..Config::default()
        };
        assert_eq!(resolve_pdf_binary(&config), None);
        assert!(matches!(
            check_pdf_binary(&config),
            Err(Error::BinaryMissing(BinaryKind::PdfGenerator))
        ));
        assert!(matches!(
            check_convert_binary(&config),
            Err(Error::BinaryMissing(BinaryKind::Convert))
        ));
    }

    #[test]
    fn missing_file_is_not_executable() {
        let config = Config {
            binary_convert: Some(PathBuf::from("/nonexistent/convert")),
            ..Config::default()
        };
        assert!(matches!(
            check_convert_binary(&config),
            Err(Error::BinaryNotExecutable { kind: BinaryKind::Convert, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn discover_skips_non_executables() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let plain = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        fs::write(plain.path().join("wkhtmltopdf"), "").unwrap();
        let exe = bin.path().join("wkhtmltopdf");
        fs::write(&exe, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        let found = discover_in("wkhtmltopdf", [plain.path(), bin.path()]);
        assert_eq!(found, Some(exe));
    }
}
