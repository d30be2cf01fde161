//! Loader for `linkpeek.yaml` with environment overlays.
//!
//! Sources merge in the order they are added; `LINKPEEK__SECTION__KEY`
//! environment variables are applied last. After merging, `${VAR}` placeholders
//! in string values are expanded from the process environment. Every section
//! and field is optional.
//!
//! ```yaml
//! http:
//!   timeout_secs: 15
//!   connect_timeout_secs: 5
//!   retries: 0
//!   user_agent: "linkpeek/0.1"
//! extract:
//!   mode: basic            # or direct-parse
//!   default_kind: website  # any content-kind raw value
//!   status_policy: degrade # or fail
//!   concurrency: 4
//! logging:
//!   format: text           # or json
//!   dir: "${HOME}/logs"
//!   stderr: false
//!   filter: info
//! ```
use config::{Config, ConfigError, Environment, File};
use linkpeek_common::observability::LogFormat;
use linkpeek_common::{ContentKind, ExtractMode, StatusPolicy};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "LINKPEEK";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkpeekConfig {
    pub http: HttpSection,
    pub extract: ExtractSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub retries: usize,
    pub user_agent: Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
            retries: 0,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractSection {
    pub mode: ExtractMode,
    pub default_kind: ContentKind,
    pub status_policy: StatusPolicy,
    /// Upper bound on previews in flight at once.
    pub concurrency: usize,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            mode: ExtractMode::Basic,
            default_kind: ContentKind::Website,
            status_policy: StatusPolicy::Degrade,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
    /// Used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// `<config_dir>/linkpeek/linkpeek.yaml`, e.g. `~/.config/linkpeek/linkpeek.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("linkpeek").join("linkpeek.yaml"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct LinkpeekConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env: Environment,
}

impl Default for LinkpeekConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkpeekConfigLoader {
    /// Empty loader; only `LINKPEEK__*` overrides apply until files are added.
    ///
    /// ```
    /// use linkpeek_config::LinkpeekConfigLoader;
    ///
    /// let config = LinkpeekConfigLoader::new()
    ///     .with_yaml_str("http:\n  timeout_secs: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.http.timeout_secs, 3);
    /// assert_eq!(config.http.connect_timeout_secs, 5);
    /// assert_eq!(config.extract.concurrency, 4);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env: Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        }
    }

    /// Attach a required YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use linkpeek_common::{ContentKind, ExtractMode, StatusPolicy};
    /// use linkpeek_config::LinkpeekConfigLoader;
    ///
    /// let cfg = LinkpeekConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// extract:
    ///   mode: direct-parse
    ///   default_kind: article
    ///   status_policy: fail
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.extract.mode, ExtractMode::DirectParse);
    /// assert_eq!(cfg.extract.default_kind, ContentKind::Article);
    /// assert_eq!(cfg.extract.status_policy, StatusPolicy::Fail);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    pub fn load(self) -> Result<LinkpeekConfig, ConfigError> {
        let cfg = self.builder.add_source(self.env).build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
