//! Current vs. upstream Steam build id, and update application (C3).
//!
//! `current()` shells out to `steamcmd` and scans for `BuildID <n>`;
//! `latest()` calls `api.steamcmd.net` and validates the nested JSON shape;
//! both recover to `None` on failure rather than propagating an error, so a
//! flaky network or a broken `steamcmd` install never takes the scheduler
//! down.

use std::process::Command;

use serde::Deserialize;
use tracing::{error, warn};

/// Upstream JSON shape for `GET https://api.steamcmd.net/v1/info/{app_id}`.
#[derive(Debug, Deserialize)]
struct SteamCmdInfoResponse {
    data: std::collections::HashMap<String, AppInfo>,
}

#[derive(Debug, Deserialize)]
struct AppInfo {
    depots: Depots,
}

#[derive(Debug, Deserialize)]
struct Depots {
    branches: Branches,
}

#[derive(Debug, Deserialize)]
struct Branches {
    public: PublicBranch,
}

#[derive(Debug, Deserialize)]
struct PublicBranch {
    buildid: String,
}

pub struct VersionProbe {
    app_id: u32,
    http: reqwest::blocking::Client,
}

impl VersionProbe {
    pub fn new(app_id: u32) -> Self {
        VersionProbe {
            app_id,
            http: reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("build steamcmd.net http client"),
        }
    }

    /// Currently installed build id, via `steamcmd +app_status`.
    pub fn current(&self) -> Option<u64> {
        let output = Command::new("steamcmd")
            .arg("+login")
            .arg("anonymous")
            .arg("+app_info_update")
            .arg("1")
            .arg("+app_status")
            .arg(self.app_id.to_string())
            .arg("+quit")
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "failed to invoke steamcmd for current build id");
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_build_id(&stdout)
    }

    /// Upstream build id on the public branch, via api.steamcmd.net.
    pub fn latest(&self) -> Option<u64> {
        let url = format!("https://api.steamcmd.net/v1/info/{}", self.app_id);
        let response = match self.http.get(&url).send() {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "failed to reach api.steamcmd.net");
                return None;
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "api.steamcmd.net returned a non-success status");
                return None;
            }
        };

        let parsed: SteamCmdInfoResponse = match response.json() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "failed to parse api.steamcmd.net response");
                return None;
            }
        };

        let app_info = parsed.data.get(&self.app_id.to_string())?;
        app_info
            .depots
            .branches
            .public
            .buildid
            .parse::<u64>()
            .ok()
    }

    /// `current() != latest()` when both are known; `false` otherwise.
    pub fn update_available(&self) -> bool {
        match (self.current(), self.latest()) {
            (Some(current), Some(latest)) => current != latest,
            _ => false,
        }
    }

    /// Run `steamcmd +app_update <id> validate`; success iff the tool
    /// exits 0.
    pub fn apply(&self) -> bool {
        let status = Command::new("steamcmd")
            .arg("+login")
            .arg("anonymous")
            .arg("+app_update")
            .arg(self.app_id.to_string())
            .arg("validate")
            .arg("+quit")
            .status();

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                error!(error = %e, "failed to invoke steamcmd for update");
                false
            }
        }
    }
}

fn parse_build_id(stdout: &str) -> Option<u64> {
    for line in stdout.lines() {
        if let Some(idx) = line.find("BuildID") {
            let rest = &line[idx + "BuildID".len()..];
            let digits: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Ok(value) = digits.parse() {
                return Some(value);
            }
        }
    }
    None
}
