//! Orchestrator - wires the six pipeline stages onto the event bus.
//!
//! ```text
//! onUserLogin(token) ─┬─> preferences fetch ─> onUserPreferences ─┐
//!                     └─> device fetch ──────> onDevice ──────────┴─> onReadyToMatch(p, d)
//!   ─> match fetch ─> onMatch ─> transform fetch ─> onTransformation
//!   ─> launch fetch ─> onSnapshot ─> snapshot write
//! ```
//!
//! Each handler issues exactly one remote call on a spawned task and
//! returns, so bus dispatch never waits on the network. A failed call is
//! logged, reported on the [`RunMonitor`] and ends the run; nothing is
//! retried or rolled back.
//!
//! A panic inside a stage task is an internal fault: the run is failed and
//! the fault is raised on [`Orchestrator::faults`] so the process can stop.

use crate::error::{Error, Result};
use crate::event_bus::{panic_message, AggregateSpec, EventBus};
use crate::monitor::{RunEvent, RunMonitor};
use crate::pipeline::{signals, RunId, RunState, Stage};
use chrono::Utc;
use flowmanager_sources::{build_source, DataSource, Role, SourcesConfig, TemplateParams};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info};

const PREFERENCES_CONSTITUENT: &str = "userPreferences";
const DEVICE_CONSTITUENT: &str = "device";

/// The six backend handles, one per role.
#[derive(Clone)]
pub struct DataSources {
    /// Preference store, fetched with the user token
    pub user_preferences: Arc<dyn DataSource>,
    /// Device reporter
    pub device_reporter: Arc<dyn DataSource>,
    /// Match maker
    pub match_maker: Arc<dyn DataSource>,
    /// Transformer
    pub transformer: Arc<dyn DataSource>,
    /// Launch manager
    pub launch_manager: Arc<dyn DataSource>,
    /// Snapshot store
    pub snapshot: Arc<dyn DataSource>,
}

impl DataSources {
    /// Build every source from configuration, sharing one HTTP client.
    pub fn from_config(config: &SourcesConfig, client: &reqwest::Client) -> Result<Self> {
        let build = |role: Role| build_source(role, config.get(role), &config.vars, client);
        Ok(Self {
            user_preferences: build(Role::UserPreferences)?,
            device_reporter: build(Role::DeviceReporter)?,
            match_maker: build(Role::MatchMaker)?,
            transformer: build(Role::Transformer)?,
            launch_manager: build(Role::LaunchManager)?,
            snapshot: build(Role::Snapshot)?,
        })
    }

    /// Source for `role`.
    pub fn get(&self, role: Role) -> &Arc<dyn DataSource> {
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

/// Outbound call of one stage.
enum Call {
    Fetch(TemplateParams),
    Write(TemplateParams, Value),
}

type Handler = fn(&Arc<Orchestrator>, RunId, &[Value]);

/// Long-lived dispatcher for pipeline runs.
///
/// Holds no per-run state: everything a run needs travels in the signal
/// arguments, keyed by its [`RunId`].
pub struct Orchestrator {
    sources: DataSources,
    bus: Arc<EventBus>,
    monitor: RunMonitor,
    fault: watch::Sender<Option<String>>,
}

impl Orchestrator {
    /// Create the orchestrator and wire its handlers onto `bus`.
    pub fn new(sources: DataSources, bus: Arc<EventBus>, monitor: RunMonitor) -> Result<Arc<Self>> {
        let (fault, _) = watch::channel(None);
        let orchestrator = Arc::new(Self {
            sources,
            bus,
            monitor,
            fault,
        });
        orchestrator.wire()?;
        Ok(orchestrator)
    }

    fn wire(self: &Arc<Self>) -> Result<()> {
        self.bus.define_aggregate(
            AggregateSpec::new(signals::READY_TO_MATCH)
                .constituent(PREFERENCES_CONSTITUENT, signals::USER_PREFERENCES)
                .constituent(DEVICE_CONSTITUENT, signals::DEVICE)
                .forward(PREFERENCES_CONSTITUENT, 0)
                .forward(DEVICE_CONSTITUENT, 0),
        )?;

        self.listen(signals::USER_LOGIN, Self::get_user_preferences);
        self.listen(signals::USER_LOGIN, Self::get_device);
        self.listen(signals::READY_TO_MATCH, Self::on_ready_to_match);
        self.listen(signals::MATCH, Self::on_match);
        self.listen(signals::TRANSFORMATION, Self::on_transformation);
        self.listen(signals::SNAPSHOT, Self::on_snapshot);
        Ok(())
    }

    fn listen(self: &Arc<Self>, signal: &str, handler: Handler) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(signal, move |run, args| {
            if let Some(this) = weak.upgrade() {
                handler(&this, run, args);
            }
        });
    }

    /// The bus this orchestrator is wired onto.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The run monitor.
    pub fn monitor(&self) -> &RunMonitor {
        &self.monitor
    }

    /// Internal faults: `None` until a stage task panics, then the panic
    /// message.
    pub fn faults(&self) -> watch::Receiver<Option<String>> {
        self.fault.subscribe()
    }

    /// Start a run for `token` and return its id without waiting for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, token: &str) -> RunId {
        let run = RunId::new();
        info!(run_id = %run, state = %RunState::Idle, "User token accepted");
        debug!(run_id = %run, token, "Token");

        self.monitor.publish(RunEvent::RunStarted {
            run_id: run,
            started_at: Utc::now(),
        });
        self.bus
            .fire(signals::USER_LOGIN, run, vec![Value::String(token.to_string())]);
        run
    }

    fn get_user_preferences(self: &Arc<Self>, run: RunId, args: &[Value]) {
        let token = args.first().and_then(Value::as_str).unwrap_or_default();
        let params = TemplateParams::new().with("token", urlencoding::encode(token));
        self.spawn_call(run, Stage::Preferences, Call::Fetch(params));
    }

    fn get_device(self: &Arc<Self>, run: RunId, _args: &[Value]) {
        self.spawn_call(run, Stage::Device, Call::Fetch(TemplateParams::new()));
    }

    fn on_ready_to_match(self: &Arc<Self>, run: RunId, args: &[Value]) {
        self.monitor.publish(RunEvent::Joined { run_id: run });

        let query = encode_query(&[
            ("userPreferences", arg(args, 0)),
            ("device", arg(args, 1)),
        ]);
        self.spawn_query(run, Stage::Match, query);
    }

    fn on_match(self: &Arc<Self>, run: RunId, args: &[Value]) {
        let query = encode_query(&[("data", arg(args, 0))]);
        self.spawn_query(run, Stage::Transform, query);
    }

    fn on_transformation(self: &Arc<Self>, run: RunId, args: &[Value]) {
        let query = encode_query(&[("data", arg(args, 0))]);
        self.spawn_query(run, Stage::Launch, query);
    }

    fn on_snapshot(self: &Arc<Self>, run: RunId, args: &[Value]) {
        let snapshot = arg(args, 0).clone();
        self.spawn_call(
            run,
            Stage::SnapshotWrite,
            Call::Write(TemplateParams::new(), snapshot),
        );
    }

    fn spawn_query(self: &Arc<Self>, run: RunId, stage: Stage, query: Result<String>) {
        match query {
            Ok(query) => {
                let params = TemplateParams::new().with("query", query);
                self.spawn_call(run, stage, Call::Fetch(params));
            }
            Err(e) => self.fail(run, stage, &e.to_string()),
        }
    }

    fn spawn_call(self: &Arc<Self>, run: RunId, stage: Stage, call: Call) {
        info!(
            run_id = %run,
            stage = %stage,
            role = %stage.role(),
            state = %stage.awaiting(),
            "Issuing request"
        );

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let source = this.sources.get(stage.role());
            let result = match &call {
                Call::Fetch(params) => source.fetch(params).await,
                Call::Write(params, payload) => source.write(params, payload).await,
            };
            match result {
                Ok(payload) => this.complete(run, stage, payload),
                Err(e) => this.fail(run, stage, &e.to_string()),
            }
        });

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                if e.is_panic() {
                    let message = panic_message(e.into_panic().as_ref());
                    supervisor.internal_fault(run, stage, message);
                }
            }
        });
    }

    fn internal_fault(&self, run: RunId, stage: Stage, message: String) {
        error!(run_id = %run, stage = %stage, panic = %message, "Internal fault in stage task");
        self.fail(run, stage, &format!("internal fault: {message}"));
        self.fault.send_replace(Some(message));
    }

    fn complete(&self, run: RunId, stage: Stage, payload: Value) {
        info!(run_id = %run, stage = %stage, payload = %payload, "Stage completed");
        self.monitor.publish(RunEvent::StageCompleted { run_id: run, stage });

        match stage.success_signal() {
            Some(signal) => self.bus.fire(signal, run, vec![payload]),
            None => {
                info!(run_id = %run, state = %RunState::Persisted, "Successfully saved the snapshot");
                self.monitor.publish(RunEvent::SnapshotPersisted { run_id: run });
            }
        }
    }

    fn fail(&self, run: RunId, stage: Stage, message: &str) {
        error!(
            run_id = %run,
            stage = %stage,
            role = %stage.role(),
            state = %RunState::Failed,
            error = %message,
            "Stage failed"
        );

        let first = stage
            .success_signal()
            .map_or(true, |signal| self.bus.retire(signal, run));
        if first {
            self.monitor.publish(RunEvent::RunFailed {
                run_id: run,
                stage,
                error: message.to_string(),
            });
        }
    }
}

static NULL: Value = Value::Null;

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

/// Serialize each payload as JSON and urlencode the pairs into one query
/// string (`name=<json>&...`).
fn encode_query(pairs: &[(&str, &Value)]) -> Result<String> {
    let encoded: Vec<(&str, String)> = pairs
        .iter()
        .map(|(name, value)| (*name, value.to_string()))
        .collect();
    serde_urlencoded::to_string(&encoded)
        .map_err(|e| Error::Internal(format!("failed to encode query: {e}")))
}
