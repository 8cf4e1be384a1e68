// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout and loading.
//!
//! Specify the layout of the JSON configuration file that jwalci reads at
//! startup, and resolve where that configuration comes from. The configuration
//! is only ever read. Nothing in jwalci writes it back.
//!
//! # Configuration Sources
//!
//! The `--config` option accepts a __source string__ in one of these forms:
//!
//! - `{...}`: the whole string is literal JSON.
//! - `json:{...}`: the remainder after the prefix is literal JSON.
//! - `file:<path>`: the remainder after the prefix is a path.
//! - `<path>`: anything else is a path.
//!
//! Paths are shell expanded, so `~/ci.json` and `$HOME/ci.json` both work. A
//! path that does not exist yields the empty configuration.

use crate::rewrite::{rewrite, UrlRewrite};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Load configuration from a source string, or from a default path.
///
/// # Errors
///
/// - Return [`ConfigError::ShellExpansion`] if a path cannot be expanded.
/// - Return [`ConfigError::Read`] if an existing file cannot be read.
/// - Return [`ConfigError::Deserialize`] if the content is not valid JSON.
/// - Return [`ConfigError::NotAnObject`] if the JSON is not an object.
pub fn load(source: Option<&str>, default_path: &Path) -> Result<Configuration> {
    let source = match source {
        Some(source) => source.parse::<ConfigSource>()?,
        None => ConfigSource::File(default_path.to_path_buf()),
    };

    source.load()
}

/// Where configuration content comes from.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ConfigSource {
    /// Literal JSON given on the command line.
    Inline(String),

    /// Path to a JSON file.
    File(PathBuf),
}

impl ConfigSource {
    /// Read and parse the configuration this source points at.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if an existing file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the content is not valid JSON.
    /// - Return [`ConfigError::NotAnObject`] if the JSON is not an object.
    #[instrument(level = "debug")]
    pub fn load(&self) -> Result<Configuration> {
        let config: Configuration = match self {
            Self::Inline(data) => data.parse()?,
            Self::File(path) => {
                if !path.exists() {
                    debug!("no configuration at {:?}, using defaults", path.display());
                    return Ok(Configuration::default());
                }

                read_to_string(path)
                    .map_err(|err| ConfigError::Read {
                        source: err,
                        path: path.clone(),
                    })?
                    .parse()?
            }
        };
        debug!("loaded configuration:\n{config}");

        Ok(config)
    }
}

impl FromStr for ConfigSource {
    type Err = ConfigError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        if source.starts_with('{') {
            return Ok(Self::Inline(source.to_string()));
        }

        if let Some(data) = source.strip_prefix("json:") {
            return Ok(Self::Inline(data.to_string()));
        }

        let path = source.strip_prefix("file:").unwrap_or(source);

        // INVARIANT: Perform shell expansion on configuration paths.
        let path = shellexpand::full(path)
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();

        Ok(Self::File(PathBuf::from(path)))
    }
}

/// Configuration layout.
///
/// Only `urlrewrites` carries meaning for jwalci. Any other top-level key is
/// kept verbatim in [`Configuration::settings`].
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct Configuration {
    /// Ordered prefix rewrite rules for URLs.
    #[serde(default)]
    pub urlrewrites: Vec<UrlRewrite>,

    /// Remaining settings jwalci does not interpret.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl Configuration {
    /// Rewrite URL through configured rewrite rules.
    pub fn rewrite_url(&self, url: impl AsRef<str>) -> String {
        rewrite(url, &self.urlrewrites)
    }
}

impl FromStr for Configuration {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Top level must be a mapping of setting name to value.
        if !value.is_object() {
            return Err(ConfigError::NotAnObject);
        }

        serde_json::from_value(value).map_err(ConfigError::Deserialize)
    }
}

impl Display for Configuration {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_json::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("failed to parse configuration")]
    Deserialize(#[source] serde_json::Error),

    /// Failed to serialize configuration.
    #[error("failed to serialize configuration")]
    Serialize(#[source] serde_json::Error),

    /// Configuration is valid JSON, but not a JSON object.
    #[error("configuration must be a JSON object")]
    NotAnObject,

    /// Configuration file exists but cannot be read.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to perform shell expansion on configuration path.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::fs::write;

    const REWRITES: &str = r#"{"urlrewrites": [{"from": "http://a/", "to": "http://b/"}]}"#;

    fn expect_rewrites() -> Configuration {
        Configuration {
            urlrewrites: vec![UrlRewrite::new("http://a/", "http://b/")],
            settings: Map::new(),
        }
    }

    #[test_case(REWRITES.to_string(); "bare object")]
    #[test_case(format!("json:{REWRITES}"); "json prefix")]
    #[test]
    fn inline_sources_parse_identically(source: String) -> anyhow::Result<()> {
        let result = load(Some(&source), Path::new("/does/not/exist.json"))?;
        pretty_assertions::assert_eq!(result, expect_rewrites());

        Ok(())
    }

    #[test]
    fn source_string_forms() -> anyhow::Result<()> {
        pretty_assertions::assert_eq!(
            "{}".parse::<ConfigSource>()?,
            ConfigSource::Inline("{}".into())
        );
        pretty_assertions::assert_eq!(
            "json:[1]".parse::<ConfigSource>()?,
            ConfigSource::Inline("[1]".into())
        );
        pretty_assertions::assert_eq!(
            "file:/etc/ci.json".parse::<ConfigSource>()?,
            ConfigSource::File("/etc/ci.json".into())
        );
        pretty_assertions::assert_eq!(
            "/etc/ci.json".parse::<ConfigSource>()?,
            ConfigSource::File("/etc/ci.json".into())
        );

        Ok(())
    }

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn file_source_is_shell_expanded() -> anyhow::Result<()> {
        let result: ConfigSource = "file:$BLAH/ci.json".parse()?;
        pretty_assertions::assert_eq!(result, ConfigSource::File("/home/blah/ci.json".into()));

        Ok(())
    }

    #[test]
    fn missing_file_yields_empty_configuration() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("nope.json");

        let result = load(None, &missing)?;
        pretty_assertions::assert_eq!(result, Configuration::default());

        let source = format!("file:{}", missing.display());
        let result = load(Some(&source), Path::new("/unused"))?;
        pretty_assertions::assert_eq!(result, Configuration::default());

        Ok(())
    }

    #[test]
    fn existing_file_is_parsed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ci.json");
        write(
            &path,
            indoc! {r#"
                {
                    "urlrewrites": [
                        {"from": "http://a/", "to": "http://b/"},
                        {"from": "http://a/x", "to": "http://c/"}
                    ],
                    "owner": "ci"
                }
            "#},
        )?;

        let result = load(None, &path)?;
        pretty_assertions::assert_eq!(result.rewrite_url("http://a/x/y"), "http://b/x/y");
        pretty_assertions::assert_eq!(result.settings.get("owner"), Some(&Value::from("ci")));

        Ok(())
    }

    #[test]
    fn unknown_keys_are_kept() -> anyhow::Result<()> {
        let result: Configuration = r#"{"colour": "blue"}"#.parse()?;
        assert!(result.urlrewrites.is_empty());
        pretty_assertions::assert_eq!(result.settings.get("colour"), Some(&Value::from("blue")));

        Ok(())
    }

    #[test_case("{not json"; "malformed")]
    #[test_case("json:[1, 2]"; "array")]
    #[test_case(r#"{"urlrewrites": [{"from": 1}]}"#; "bad rewrite rule")]
    #[test]
    fn bad_content_is_fatal(source: &str) {
        let result = load(Some(source), Path::new("/unused"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_file_is_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ci.json");
        write(&path, "{\"urlrewrites\": ")?;

        let result = load(None, &path);
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));

        Ok(())
    }
}
