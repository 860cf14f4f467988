//! Aggregates process lifecycle, version management, and the REST control
//! API behind a single facade with a lifecycle state machine and escalation
//! policy (C5).
//!
//! `state()` is derived from process liveness and API health; `stop()`
//! escalates from graceful (60s poll) to force (30s) on timeout; `update()`
//! stops the server before applying and leaves starting it back up to the
//! caller.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api_client::ServerApiClient;
use crate::clock;
use crate::process::ManagedProcess;
use crate::system_metrics::PROCESS_MEMORY_THRESHOLD_PERCENT;
use crate::version::VersionProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Running,
    Unresponsive,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    Graceful,
    Force,
}

const GRACEFUL_SHUTDOWN_DELAY_SECONDS: u32 = 5;
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(60);
const FORCE_ESCALATION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ManagedServer {
    process: ManagedProcess,
    version: VersionProbe,
    api: ServerApiClient,
}

impl ManagedServer {
    pub fn new(process: ManagedProcess, version: VersionProbe, api: ServerApiClient) -> Self {
        ManagedServer { process, version, api }
    }

    /// Derive the current state from process liveness and API health.
    /// `Unknown` is reserved for probe errors; the process/API probes in
    /// this stack do not themselves raise (they return `bool`/`false`), so
    /// in practice this facade never reports `Unknown` -- it is retained in
    /// the enum so callers (and the scheduler's predicates) can match on
    /// all four variants.
    pub fn state(&self) -> ServerState {
        let process_alive = self.process.is_running();
        if !process_alive {
            return ServerState::Stopped;
        }
        if !self.api.health_check() {
            return ServerState::Unresponsive;
        }
        ServerState::Running
    }

    pub fn is_out_of_memory(&self) -> bool {
        self.process.memory_percent() >= PROCESS_MEMORY_THRESHOLD_PERCENT
    }

    /// No-op if already running; otherwise starts the process.
    pub fn start(&self) {
        if self.state() == ServerState::Running {
            debug!("start: server already running");
            return;
        }
        if let Err(e) = self.process.start() {
            warn!(error = %e, "failed to start server process");
        }
    }

    /// Stop the server, escalating from graceful to force on timeout.
    pub fn stop(&self, mode: StopMode, timeout: Duration) -> bool {
        match mode {
            StopMode::Force => self.stop_forcefully(timeout),
            StopMode::Graceful => {
                if self.stop_gracefully(timeout) {
                    return true;
                }
                warn!("graceful shutdown failed; escalating to force stop");
                self.stop_forcefully(FORCE_ESCALATION_TIMEOUT)
            }
        }
    }

    /// [`Self::stop`] with the default 60s graceful timeout.
    pub fn stop_default(&self, mode: StopMode) -> bool {
        self.stop(mode, DEFAULT_STOP_TIMEOUT)
    }

    fn stop_gracefully(&self, timeout: Duration) -> bool {
        match self.state() {
            ServerState::Stopped => return true,
            ServerState::Running => {}
            ServerState::Unresponsive | ServerState::Unknown => {
                warn!("server not responsive; cannot stop gracefully");
                return false;
            }
        }

        debug!("saving server state before graceful shutdown");
        if let Err(e) = self.api.save() {
            warn!(error = %e, "save failed; continuing with shutdown request");
        }

        info!("requesting graceful shutdown via API");
        if let Err(e) = self
            .api
            .shutdown("Server shutting down", GRACEFUL_SHUTDOWN_DELAY_SECONDS)
        {
            warn!(error = %e, "shutdown request failed");
            return false;
        }

        let stopped = clock::until_default(|| !self.process.is_running(), timeout);
        if stopped {
            info!("server stopped successfully");
        }
        stopped
    }

    fn stop_forcefully(&self, timeout: Duration) -> bool {
        if self.state() == ServerState::Stopped {
            return true;
        }

        info!("force stopping server process");
        self.process.terminate(Duration::from_secs(5));

        let stopped = clock::until_default(|| !self.process.is_running(), timeout);
        if stopped {
            info!("server force-stopped successfully");
        } else {
            warn!("failed to force-stop server");
        }
        stopped
    }

    pub fn update_available(&self) -> bool {
        self.version.update_available()
    }

    /// If an update is available, stop the server gracefully and apply it.
    /// Safe to call unconditionally; a no-op when no update is available.
    /// Does not start the server back up -- callers append an explicit
    /// `Start` task after `Update` rather than relying on an implicit one.
    pub fn update(&self) {
        if !self.version.update_available() {
            debug!("no server update available");
            return;
        }

        info!("server update available");
        self.stop_default(StopMode::Graceful);

        info!("applying server update");
        if !self.version.apply() {
            warn!("server update failed");
        }
    }

    /// `false` when the server is not running; otherwise delegates to the
    /// API and returns `true`.
    pub fn announce(&self, message: &str) -> bool {
        if self.state() != ServerState::Running {
            debug!("skipping announce; server not running");
            return false;
        }
        if let Err(e) = self.api.announce(message) {
            warn!(error = %e, "announce failed");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api_client::ServerApiClient;
    use crate::config::Auth;
    use crate::process::ManagedProcess;
    use crate::system_metrics::SystemMetrics;
    use crate::version::VersionProbe;

    /// A server wired to a real short-lived child process and an
    /// unreachable control API, so `save`/`shutdown` always fail transport
    /// and graceful stop must escalate to a process-level force stop.
    fn sleepy_server() -> ManagedServer {
        let command = if cfg!(windows) {
            vec!["cmd".to_string(), "/C".to_string(), "timeout /T 30".to_string()]
        } else {
            vec!["sleep".to_string(), "30".to_string()]
        };
        let process = ManagedProcess::new(command, None, Arc::new(SystemMetrics::new()));
        let version = VersionProbe::new(0);
        let api = ServerApiClient::new(
            "http://127.0.0.1:1".to_string(),
            Auth::Token { token: "x".to_string() },
        );
        ManagedServer::new(process, version, api)
    }

    #[test]
    fn stop_on_never_started_process_is_idempotent() {
        let server = sleepy_server();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.stop_default(StopMode::Graceful));
        assert!(server.stop_default(StopMode::Graceful));
    }

    #[test]
    fn force_stop_kills_running_process() {
        let server = sleepy_server();
        server.start();
        assert!(clock::until_default(
            || server.state() != ServerState::Stopped,
            Duration::from_secs(5)
        ));

        assert!(server.stop(StopMode::Force, Duration::from_secs(5)));
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn graceful_stop_escalates_to_force_when_api_is_unreachable() {
        let server = sleepy_server();
        server.start();
        assert!(clock::until_default(
            || server.state() != ServerState::Stopped,
            Duration::from_secs(5)
        ));

        // `save`/`shutdown` fail against the unreachable API, so
        // `stop_gracefully` must fail and `stop` must escalate to a force
        // stop of the underlying process rather than leaving it running.
        assert!(server.stop(StopMode::Graceful, Duration::from_secs(5)));
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
