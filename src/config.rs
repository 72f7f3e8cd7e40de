//! Configuration management for `blogdown.toml`.
//!
//! The configuration is built once at startup and passed by reference into
//! each component; nothing here is globally mutable.
//!
//! # Sections
//!
//! | Section   | Purpose                                          |
//! |-----------|--------------------------------------------------|
//! | `[posts]` | Content root, include/exclude glob patterns      |
//! | `[build]` | Output directory, component extension, wrapper   |
//! | `[cache]` | Persisted cache file name, disable switch        |
//! | `[hooks]` | Built-in hook options (href prefix, tag map)     |

use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::log;
use crate::utils::normalize_path;

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Root configuration structure representing blogdown.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    /// Project root directory - parent of the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Content settings
    pub posts: PostsConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Persisted cache settings
    pub cache: CacheConfig,

    /// Built-in hook settings
    pub hooks: HooksConfig,
}

/// `[posts]` - content directory and glob patterns.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostsConfig {
    /// Directory containing post sources, relative to the project root.
    pub dir: PathBuf,
    /// Include glob patterns, relative to the posts directory.
    pub includes: Vec<String>,
    /// Exclude glob patterns, relative to the posts directory.
    pub excludes: Vec<String>,
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("posts"),
            includes: vec!["**/*.md".to_string()],
            excludes: vec!["**/node_modules/**".to_string(), "**/.git/**".to_string()],
        }
    }
}

/// `[build]` - output layout and component emission.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory, relative to the project root.
    pub out: PathBuf,
    /// Extension of the emitted component files.
    pub component_ext: String,
    /// Container tag wrapping the rendered markup.
    pub wrapper: String,
    /// Subdirectory (under `out`) for excerpt components.
    pub excerpts_dir: String,
    /// File name of the generated manifest.
    pub entry_file: String,
    /// Symbol used for heading anchor links.
    pub anchor_symbol: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out: PathBuf::from(".blog"),
            component_ext: "vue".to_string(),
            wrapper: "div".to_string(),
            excerpts_dir: "excerpts".to_string(),
            entry_file: "entry.ts".to_string(),
            anchor_symbol: "#".to_string(),
        }
    }
}

/// `[cache]` - persisted render cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Snapshot file name, relative to the output directory.
    pub file: String,
    /// Disable the render cache entirely (every probe misses).
    pub disable: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: ".blogdown-cache.json".to_string(),
            disable: false,
        }
    }
}

/// `[hooks]` - options consumed by the built-in hook set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// URL prefix for resolved post links in excerpt renders.
    pub post_href_prefix: String,
    /// Tag rename map applied by the tag hook, in iteration order.
    pub tag_map: FxHashMap<String, String>,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            post_href_prefix: "/post".to_string(),
            tag_map: FxHashMap::default(),
        }
    }
}

impl BlogConfig {
    /// Load configuration from CLI arguments.
    ///
    /// A missing config file is not an error: defaults apply and the
    /// project root is the current directory.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let config_path = normalize_path(&cli.config);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        config.root = config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        config.apply_cli(cli);
        Ok(config)
    }

    /// Parse a config file, warning about unrecognized keys.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let de = toml::de::Deserializer::new(&text);
        let mut unknown = Vec::new();
        let config: Self = serde_ignored::deserialize(de, |key| {
            unknown.push(key.to_string());
        })
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        for key in unknown {
            log!("warn"; "unknown config key `{}` in {}", key, path.display());
        }

        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(posts) = &cli.posts {
            self.posts.dir = posts.clone();
        }
        if let Some(out) = &cli.out {
            self.build.out = out.clone();
        }
        if cli.no_cache {
            self.cache.disable = true;
        }
    }

    /// Absolute posts directory.
    pub fn posts_dir(&self) -> PathBuf {
        self.root.join(&self.posts.dir)
    }

    /// Absolute output directory.
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.build.out)
    }

    /// Absolute path of the persisted cache snapshot.
    pub fn cache_file(&self) -> PathBuf {
        self.out_dir().join(&self.cache.file)
    }
}
