//! Source configuration and construction.

use crate::file::FileDataSource;
use crate::http::HttpDataSource;
use crate::{DataSource, Error, Result, UrlTemplate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Backend role of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Per-user preference store, keyed by token
    UserPreferences,
    /// Device reporter
    DeviceReporter,
    /// Combines preferences and device data
    MatchMaker,
    /// Transforms a match into settings
    Transformer,
    /// Applies settings and produces a snapshot
    LaunchManager,
    /// Snapshot store (writable)
    Snapshot,
}

impl Role {
    /// All roles in pipeline order.
    pub const ALL: [Role; 6] = [
        Role::UserPreferences,
        Role::DeviceReporter,
        Role::MatchMaker,
        Role::Transformer,
        Role::LaunchManager,
        Role::Snapshot,
    ];

    /// Config key / log name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserPreferences => "user_preferences",
            Self::DeviceReporter => "device_reporter",
            Self::MatchMaker => "match_maker",
            Self::Transformer => "transformer",
            Self::LaunchManager => "launch_manager",
            Self::Snapshot => "snapshot",
        }
    }

    /// Term map used when the config does not override it.
    pub fn default_term_map(&self) -> BTreeMap<String, String> {
        let term = match self {
            Self::UserPreferences => Some(("token", "%token")),
            Self::MatchMaker | Self::Transformer | Self::LaunchManager => Some(("query", "%query")),
            Self::DeviceReporter | Self::Snapshot => None,
        };
        term.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Only the snapshot store accepts writes unless configured otherwise.
    pub fn default_writable(&self) -> bool {
        matches!(self, Self::Snapshot)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method used for writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    /// POST (default)
    #[default]
    Post,
    /// PUT
    Put,
}

/// Configuration of one data source (`[sources.<role>]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Endpoint URL; may contain `${var}` references and term placeholders
    pub url: String,
    /// Overrides the role's default term map
    #[serde(default)]
    pub term_map: Option<BTreeMap<String, String>>,
    /// Overrides the role's default writability
    #[serde(default)]
    pub writable: Option<bool>,
    /// Method used by `write`
    #[serde(default)]
    pub write_method: WriteMethod,
}

/// All six sources plus the shared variable table (`[sources]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Values for `${var}` references in URLs
    #[serde(default)]
    pub vars: HashMap<String, String>,
    /// Preference store
    pub user_preferences: SourceConfig,
    /// Device reporter
    pub device_reporter: SourceConfig,
    /// Match maker
    pub match_maker: SourceConfig,
    /// Transformer
    pub transformer: SourceConfig,
    /// Launch manager
    pub launch_manager: SourceConfig,
    /// Snapshot store
    pub snapshot: SourceConfig,
}

impl SourcesConfig {
    /// Configuration for `role`.
    pub fn get(&self, role: Role) -> &SourceConfig {
        match role {
            Role::UserPreferences => &self.user_preferences,
            Role::DeviceReporter => &self.device_reporter,
            Role::MatchMaker => &self.match_maker,
            Role::Transformer => &self.transformer,
            Role::LaunchManager => &self.launch_manager,
            Role::Snapshot => &self.snapshot,
        }
    }
}

/// Build the data source for `role`, choosing the implementation by URL
/// scheme. All HTTP sources share `client`.
pub fn build_source(
    role: Role,
    config: &SourceConfig,
    vars: &HashMap<String, String>,
    client: &reqwest::Client,
) -> Result<Arc<dyn DataSource>> {
    let term_map = config
        .term_map
        .clone()
        .unwrap_or_else(|| role.default_term_map());
    let writable = config.writable.unwrap_or_else(|| role.default_writable());
    let template = UrlTemplate::new(role.as_str(), &config.url, term_map, vars)?;

    debug!(role = %role, url = %template.base(), writable, "Building data source");

    let base = template.base().to_string();
    if base.starts_with("file://") {
        Ok(Arc::new(FileDataSource::new(role.as_str(), template, writable)?))
    } else if base.starts_with("http://") || base.starts_with("https://") {
        Ok(Arc::new(HttpDataSource::with_client(
            role.as_str(),
            template,
            writable,
            config.write_method,
            client.clone(),
        )))
    } else {
        Err(Error::Configuration(format!(
            "{role}: unsupported url scheme in '{base}'"
        )))
    }
}
