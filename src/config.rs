//! Pipeline configuration module.
//!
//! Handles loading and validating `assets.toml`, and resolving the
//! process-wide [`BuildMode`]. Configuration is read once at start-up and is
//! immutable afterwards: every task receives it by reference through the
//! build context.
//!
//! ## Config File Location
//!
//! Place `assets.toml` in the project root (next to the site generator's own
//! config), or pass `--config <path>`:
//!
//! ```text
//! project/
//! ├── assets.toml        # Optional; every key has a default
//! ├── _assets/           # Source root
//! └── _site/assets/      # Build root
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! source = "_assets"         # Source root, relative to the project root
//! build = "_site/assets"     # Build root, relative to the project root
//! site = "_site"             # Site root served by the dev server
//!
//! [images]
//! optimization_level = 5     # 0-7, higher = smaller PNGs, slower
//! jpeg_quality = 90          # 1-100, used when re-encoding JPEGs
//!
//! [responsive]
//! widths = [640, 960, 1280, 1600]
//!
//! [styles]
//! targets = ["defaults"]     # browserslist queries for vendor prefixing
//!
//! [scripts]
//! minifier = ["terser", "--compress", "--mangle"]
//!
//! [site]
//! command = ["bundle", "exec", "jekyll", "build"]
//!
//! [server]
//! port = 4000
//! debounce_ms = 200
//! open = true
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the project root when no `--config` is given.
pub const CONFIG_FILENAME: &str = "assets.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Unknown build mode '{0}'")]
    UnknownMode(String),
}

/// Development or production build, resolved once from the environment.
///
/// Controls source-map emission, live reload, and whether the responsive
/// image stage is part of the requested plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// Resolve from the process's `NODE_ENV`.
    pub fn from_env() -> Self {
        let value = std::env::var_os("NODE_ENV");
        Self::from_env_value(value.as_deref().map(|v| v.to_string_lossy()).as_deref())
    }

    /// Resolve from the value of `NODE_ENV`.
    ///
    /// Unset, empty or exactly `"development"` selects development; any
    /// other value selects production. No case folding or trimming.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            None | Some("") | Some("development") => BuildMode::Development,
            Some(_) => BuildMode::Production,
        }
    }

    /// Parse an explicit `--mode` argument. Only the two canonical names and
    /// their short forms are accepted here.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }

    pub fn is_development(self) -> bool {
        self == BuildMode::Development
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}

/// Pipeline configuration loaded from `assets.toml`.
///
/// All fields have defaults matching the conventional Jekyll asset layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Source, build and site roots.
    pub paths: PathsConfig,
    /// Lossless optimization settings for the image streams.
    pub images: ImagesConfig,
    /// Responsive variant widths (production only).
    pub responsive: ResponsiveConfig,
    /// Stylesheet post-processing settings.
    pub styles: StylesConfig,
    /// External script minifier.
    pub scripts: ScriptsConfig,
    /// External site generator.
    pub site: SiteConfig,
    /// Dev server and watcher settings.
    pub server: ServerConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.optimization_level > 7 {
            return Err(ConfigError::Validation(
                "images.optimization_level must be 0-7".into(),
            ));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.responsive.widths.is_empty() {
            return Err(ConfigError::Validation(
                "responsive.widths must not be empty".into(),
            ));
        }
        if self.responsive.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "responsive.widths values must be non-zero".into(),
            ));
        }
        if self.scripts.minifier.is_empty() {
            return Err(ConfigError::Validation(
                "scripts.minifier must name a program".into(),
            ));
        }
        if self.site.command.is_empty() {
            return Err(ConfigError::Validation(
                "site.command must name a program".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".into()));
        }
        if self.paths.source.as_os_str().is_empty() || self.paths.build.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "paths.source and paths.build must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Directory layout, relative to the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub build: PathBuf,
    /// Served by the dev server; the build root normally lives inside it.
    pub site: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("_assets"),
            build: PathBuf::from("_site/assets"),
            site: PathBuf::from("_site"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// 0-7. Selects the PNG compression effort.
    pub optimization_level: u8,
    /// Quality used when re-encoding JPEGs.
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            optimization_level: 5,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponsiveConfig {
    /// Target widths in pixels; each gets its own `images/<width>w/` directory.
    pub widths: Vec<u32>,
}

impl Default for ResponsiveConfig {
    fn default() -> Self {
        Self {
            widths: vec![640, 960, 1280, 1600],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// browserslist queries deciding which vendor prefixes are emitted.
    pub targets: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            targets: vec!["defaults".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Minifier program and arguments. The input file is appended; the
    /// minified code is read from stdout.
    pub minifier: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            minifier: vec![
                "terser".to_string(),
                "--compress".to_string(),
                "--mangle".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site generator program and arguments, run in the project root.
    pub command: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            command: ["bundle", "exec", "jekyll", "build"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    /// Quiet period before a burst of file changes triggers a rebuild.
    pub debounce_ms: u64,
    /// Open the served site in the default browser on start.
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            debounce_ms: 200,
            open: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel file workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, and at least one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Load the pipeline config.
///
/// With an explicit path the file must exist. Without one, `assets.toml` in
/// `root` is used when present and stock defaults otherwise.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = root.join(CONFIG_FILENAME);
            if !candidate.exists() {
                return Ok(PipelineConfig::default());
            }
            candidate
        }
    };
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config: PipelineConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `assets.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# assetline configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Directory layout (relative to the project root)
# ---------------------------------------------------------------------------
[paths]
source = "_assets"
build = "_site/assets"
# Served by the dev server. The build root normally lives inside it.
site = "_site"

# ---------------------------------------------------------------------------
# Image optimization (images/ and uploads/ streams)
# ---------------------------------------------------------------------------
[images]
# 0-7. Higher levels spend more time compressing PNGs.
optimization_level = 5

# 1-100. Quality used when re-encoding JPEGs. The original file is kept
# whenever re-encoding would not make it smaller.
jpeg_quality = 90

# ---------------------------------------------------------------------------
# Responsive variants (production builds only)
# ---------------------------------------------------------------------------
[responsive]
# Each width is written to images/<width>w/ with a cover fit.
widths = [640, 960, 1280, 1600]

# ---------------------------------------------------------------------------
# Stylesheets
# ---------------------------------------------------------------------------
[styles]
# browserslist queries used for vendor prefixing.
targets = ["defaults"]

# ---------------------------------------------------------------------------
# Scripts
# ---------------------------------------------------------------------------
[scripts]
# Minifier program and arguments. The input file is appended and the
# minified code is read from stdout.
minifier = ["terser", "--compress", "--mangle"]

# ---------------------------------------------------------------------------
# Site generator
# ---------------------------------------------------------------------------
[site]
command = ["bundle", "exec", "jekyll", "build"]

# ---------------------------------------------------------------------------
# Dev server (development mode only)
# ---------------------------------------------------------------------------
[server]
port = 4000
# Quiet period in milliseconds before file changes trigger a rebuild.
debounce_ms = 200
# Open the site in the default browser when the server starts.
open = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel file workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_conventional_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.paths.source, PathBuf::from("_assets"));
        assert_eq!(config.paths.build, PathBuf::from("_site/assets"));
        assert_eq!(config.paths.site, PathBuf::from("_site"));
        assert_eq!(config.responsive.widths, vec![640, 960, 1280, 1600]);
        assert_eq!(config.images.optimization_level, 5);
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.site.command, vec!["bundle", "exec", "jekyll", "build"]);
    }

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[server]
port = 8080
"##;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        // Defaults preserved
        assert_eq!(config.server.debounce_ms, 200);
        assert!(config.server.open);
        assert_eq!(config.responsive.widths, vec![640, 960, 1280, 1600]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r##"
[images]
optimisation_level = 3
"##;
        assert!(toml::from_str::<PipelineConfig>(toml).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_level() {
        let mut config = PipelineConfig::default();
        config.images.optimization_level = 8;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_empty_widths_and_zero_width() {
        let mut config = PipelineConfig::default();
        config.responsive.widths.clear();
        assert!(config.validate().is_err());

        config.responsive.widths = vec![640, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_commands() {
        let mut config = PipelineConfig::default();
        config.site.command.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.scripts.minifier.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_jpeg_quality() {
        let mut config = PipelineConfig::default();
        config.images.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // BuildMode
    // =========================================================================

    #[test]
    fn unset_env_selects_development() {
        assert_eq!(BuildMode::from_env_value(None), BuildMode::Development);
        assert_eq!(BuildMode::from_env_value(Some("")), BuildMode::Development);
    }

    #[test]
    fn development_value_selects_development() {
        assert_eq!(
            BuildMode::from_env_value(Some("development")),
            BuildMode::Development
        );
    }

    #[test]
    fn any_other_value_selects_production() {
        assert_eq!(
            BuildMode::from_env_value(Some("production")),
            BuildMode::Production
        );
        assert_eq!(BuildMode::from_env_value(Some("staging")), BuildMode::Production);
    }

    #[test]
    fn env_value_is_matched_exactly() {
        for value in ["dev", "Development", "DEVELOPMENT", " development ", "development\n"] {
            assert_eq!(
                BuildMode::from_env_value(Some(value)),
                BuildMode::Production,
                "{value:?}"
            );
        }
    }

    #[test]
    fn explicit_mode_parsing() {
        assert_eq!(BuildMode::parse("prod").unwrap(), BuildMode::Production);
        assert_eq!(BuildMode::parse("Development").unwrap(), BuildMode::Development);
        assert!(matches!(
            BuildMode::parse("test"),
            Err(ConfigError::UnknownMode(_))
        ));
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn load_config_reads_project_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r##"
[responsive]
widths = [320, 640]

[processing]
max_processes = 2
"##,
        )
        .unwrap();

        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.responsive.widths, vec![320, 640]);
        assert_eq!(config.processing.max_processes, Some(2));
    }

    #[test]
    fn load_config_explicit_path_must_exist() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(matches!(
            load_config(tmp.path(), Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn load_config_validates() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[server]\nport = 0\n").unwrap();
        assert!(matches!(
            load_config(tmp.path(), None),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(10_000),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
