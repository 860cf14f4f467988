//! CLI argument parsing and environment loading.
//!
//! CLI flags are parsed with `clap`, then `APP_ENV`/`DEBUG_MODE` are read
//! from the process environment. Any missing required flag/env var is a
//! [`ConfigError`], surfaced by `main` as exit code 1 before the engine is
//! constructed — nothing downstream re-validates configuration.

use clap::{Parser, ValueEnum};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthType {
    Basic,
    Token,
}

/// Authentication mode for [`crate::api_client::ServerApiClient`].
#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    Token { token: String },
}

/// Where the game install directory is resolved from.
#[derive(Debug, Clone)]
pub enum InstallSource {
    /// `--steam-path`: resolve via `steamapps/appmanifest_<id>.acf`.
    SteamPath(String),
    /// `--install-dir`: the game directory itself.
    InstallDir(String),
}

#[derive(Debug, Parser)]
#[command(name = "steam-server-runner")]
#[command(about = "Supervises a Steam dedicated server: keeps it patched, running, and healthy")]
struct Cli {
    /// Increase log verbosity (-v, -vv); logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Steam application id of the game being supervised.
    #[arg(long)]
    app_id: u32,

    /// Path to a Steam library root (contains `steamapps/`). Mutually
    /// exclusive with `--install-dir`.
    #[arg(long)]
    steam_path: Option<String>,

    /// Explicit game install directory (force_install_dir). Mutually
    /// exclusive with `--steam-path`.
    #[arg(long)]
    install_dir: Option<String>,

    /// Base URL of the game's REST control API, e.g. http://localhost:8212.
    #[arg(long)]
    api_base_url: String,

    /// Authentication scheme for the REST control API.
    #[arg(long, value_enum, default_value = "basic")]
    auth_type: AuthType,

    #[arg(long)]
    api_username: Option<String>,

    #[arg(long)]
    api_password: Option<String>,

    #[arg(long)]
    api_token: Option<String>,

    /// Remaining arguments are passed verbatim to the game server executable.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    game_args: Vec<String>,
}

/// Fully validated configuration the rest of the system is built from.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_id: u32,
    pub install_source: InstallSource,
    pub api_base_url: String,
    pub auth: Auth,
    pub game_args: Vec<String>,
    pub app_env: String,
    pub is_production: bool,
    pub debug_mode: bool,
    pub verbose: u8,
}

impl AppConfig {
    /// Parse CLI args (from `std::env::args`) and the process environment,
    /// producing a fully validated configuration.
    pub fn parse() -> Result<AppConfig, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Result<AppConfig, ConfigError> {
        // Loaded before env reads so a `.env` file can supply APP_ENV/DEBUG_MODE;
        // a missing file is not an error, and existing env vars are not overridden.
        let _ = dotenvy::dotenv();

        let install_source = match (cli.steam_path, cli.install_dir) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(ConfigError::ConflictingInstallSource);
            }
            (Some(steam_path), None) => InstallSource::SteamPath(steam_path),
            (None, Some(install_dir)) => InstallSource::InstallDir(install_dir),
        };

        let auth = match cli.auth_type {
            AuthType::Basic => match (cli.api_username, cli.api_password) {
                (Some(username), Some(password)) => Auth::Basic { username, password },
                _ => return Err(ConfigError::MissingBasicAuth),
            },
            AuthType::Token => match cli.api_token {
                Some(token) => Auth::Token { token },
                None => return Err(ConfigError::MissingToken),
            },
        };

        let app_env = std::env::var("APP_ENV").map_err(|_| ConfigError::Missing("APP_ENV"))?;
        let is_production = app_env.eq_ignore_ascii_case("production");
        let debug_mode = std::env::var("DEBUG_MODE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(AppConfig {
            app_id: cli.app_id,
            install_source,
            api_base_url: cli.api_base_url,
            auth,
            game_args: cli.game_args,
            app_env,
            is_production,
            debug_mode,
            verbose: cli.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            verbose: 0,
            app_id: 2394010,
            steam_path: None,
            install_dir: Some("/srv/game".to_string()),
            api_base_url: "http://localhost:8212".to_string(),
            auth_type: AuthType::Basic,
            api_username: Some("admin".to_string()),
            api_password: Some("hunter2".to_string()),
            api_token: None,
            game_args: vec![],
        }
    }

    #[test]
    fn rejects_both_install_sources() {
        let mut cli = base_cli();
        cli.steam_path = Some("/steam".to_string());
        // install_dir already set by base_cli
        unsafe {
            std::env::set_var("APP_ENV", "test");
        }
        let err = AppConfig::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingInstallSource));
    }

    #[test]
    fn rejects_neither_install_source() {
        let mut cli = base_cli();
        cli.install_dir = None;
        unsafe {
            std::env::set_var("APP_ENV", "test");
        }
        let err = AppConfig::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingInstallSource));
    }

    #[test]
    fn rejects_basic_auth_without_credentials() {
        let mut cli = base_cli();
        cli.api_password = None;
        unsafe {
            std::env::set_var("APP_ENV", "test");
        }
        let err = AppConfig::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBasicAuth));
    }

    #[test]
    fn rejects_token_auth_without_token() {
        let mut cli = base_cli();
        cli.auth_type = AuthType::Token;
        unsafe {
            std::env::set_var("APP_ENV", "test");
        }
        let err = AppConfig::from_cli(cli).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[test]
    fn accepts_valid_basic_config() {
        let cli = base_cli();
        unsafe {
            std::env::set_var("APP_ENV", "production");
        }
        let config = AppConfig::from_cli(cli).expect("valid config");
        assert_eq!(config.app_id, 2394010);
        assert!(config.is_production);
        assert!(!config.debug_mode);
    }
}
