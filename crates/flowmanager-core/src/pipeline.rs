//! Pipeline vocabulary: run identifiers, signal names, stages and run states.

use flowmanager_sources::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one pipeline run, carried by every signal firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a fresh random run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signal names used by the orchestrator.
pub mod signals {
    /// A token arrived; args: `[token]`
    pub const USER_LOGIN: &str = "onUserLogin";
    /// Preferences fetched; args: `[preferences]`
    pub const USER_PREFERENCES: &str = "onUserPreferences";
    /// Device report fetched; args: `[device]`
    pub const DEVICE: &str = "onDevice";
    /// Aggregate of preferences and device; args: `[preferences, device]`
    pub const READY_TO_MATCH: &str = "onReadyToMatch";
    /// Match result; args: `[match]`
    pub const MATCH: &str = "onMatch";
    /// Transformation result; args: `[transformation]`
    pub const TRANSFORMATION: &str = "onTransformation";
    /// Snapshot produced by the launch manager; args: `[snapshot]`
    pub const SNAPSHOT: &str = "onSnapshot";
}

/// One step of the pipeline, bounded by exactly one remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetch user preferences for the token
    Preferences,
    /// Fetch the device report
    Device,
    /// Match preferences against the device
    Match,
    /// Transform the match
    Transform,
    /// Launch and obtain a snapshot
    Launch,
    /// Persist the snapshot
    SnapshotWrite,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Preferences,
        Stage::Device,
        Stage::Match,
        Stage::Transform,
        Stage::Launch,
        Stage::SnapshotWrite,
    ];

    /// Backend role called by this stage.
    pub fn role(&self) -> Role {
        match self {
            Self::Preferences => Role::UserPreferences,
            Self::Device => Role::DeviceReporter,
            Self::Match => Role::MatchMaker,
            Self::Transform => Role::Transformer,
            Self::Launch => Role::LaunchManager,
            Self::SnapshotWrite => Role::Snapshot,
        }
    }

    /// Signal fired with the stage result on success. The final write has
    /// no successor.
    pub fn success_signal(&self) -> Option<&'static str> {
        match self {
            Self::Preferences => Some(signals::USER_PREFERENCES),
            Self::Device => Some(signals::DEVICE),
            Self::Match => Some(signals::MATCH),
            Self::Transform => Some(signals::TRANSFORMATION),
            Self::Launch => Some(signals::SNAPSHOT),
            Self::SnapshotWrite => None,
        }
    }

    /// State a run is in while this stage's call is outstanding.
    pub fn awaiting(&self) -> RunState {
        match self {
            Self::Preferences | Self::Device => RunState::AwaitingPreferencesAndDevice,
            Self::Match => RunState::AwaitingMatch,
            Self::Transform => RunState::AwaitingTransform,
            Self::Launch => RunState::AwaitingSnapshot,
            Self::SnapshotWrite => RunState::Persisted,
        }
    }

    /// Log name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preferences => "preferences",
            Self::Device => "device",
            Self::Match => "match",
            Self::Transform => "transform",
            Self::Launch => "launch",
            Self::SnapshotWrite => "snapshot_write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one run.
///
/// `Idle → AwaitingPreferencesAndDevice → AwaitingMatch → AwaitingTransform
/// → AwaitingSnapshot → Persisted`, with `Failed` reachable from every
/// awaiting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Token received, nothing issued yet
    Idle,
    /// Preferences and device fetches outstanding
    AwaitingPreferencesAndDevice,
    /// Match request outstanding
    AwaitingMatch,
    /// Transform request outstanding
    AwaitingTransform,
    /// Launch request outstanding
    AwaitingSnapshot,
    /// Snapshot handed to the store
    Persisted,
    /// A stage failed; nothing further is issued
    Failed,
}

impl RunState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingPreferencesAndDevice => "awaiting_preferences_and_device",
            Self::AwaitingMatch => "awaiting_match",
            Self::AwaitingTransform => "awaiting_transform",
            Self::AwaitingSnapshot => "awaiting_snapshot",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
