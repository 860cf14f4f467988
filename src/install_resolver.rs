//! Resolves the game's install directory and executable path (C12).
//!
//! With an explicit install dir, that directory is used directly. With a
//! Steam library path, `steamapps/appmanifest_<app_id>.acf` is read for
//! `AppState.installdir`, joined under `steamapps/common/`.

use std::path::{Path, PathBuf};

use crate::config::InstallSource;
use crate::error::ResolveError;
use crate::vdf;

const STEAMAPPS_DIR: &str = "steamapps";
const COMMON_DIR: &str = "common";

pub struct InstallResolver {
    app_id: u32,
    source: InstallSource,
}

impl InstallResolver {
    pub fn new(app_id: u32, source: InstallSource) -> Self {
        InstallResolver { app_id, source }
    }

    /// The game's installation directory.
    pub fn game_dir(&self) -> Result<PathBuf, ResolveError> {
        match &self.source {
            InstallSource::InstallDir(dir) => {
                let path = PathBuf::from(dir);
                if !path.exists() {
                    return Err(ResolveError::GameDirNotFound(path.display().to_string()));
                }
                Ok(path)
            }
            InstallSource::SteamPath(steam_path) => {
                let steamapps = Path::new(steam_path).join(STEAMAPPS_DIR);
                if !steamapps.exists() {
                    return Err(ResolveError::ManifestNotFound {
                        app_id: self.app_id,
                        path: steamapps.display().to_string(),
                    });
                }

                let manifest_path = steamapps.join(format!("appmanifest_{}.acf", self.app_id));
                if !manifest_path.exists() {
                    return Err(ResolveError::ManifestNotFound {
                        app_id: self.app_id,
                        path: manifest_path.display().to_string(),
                    });
                }

                let contents = std::fs::read_to_string(&manifest_path).map_err(|e| {
                    ResolveError::ManifestParse {
                        path: manifest_path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;

                let root = vdf::parse(&contents).map_err(|reason| ResolveError::ManifestParse {
                    path: manifest_path.display().to_string(),
                    reason,
                })?;

                let installdir =
                    root.get_path("AppState.installdir")
                        .ok_or_else(|| ResolveError::MissingInstallDir {
                            path: manifest_path.display().to_string(),
                        })?;

                let game_dir = steamapps.join(COMMON_DIR).join(installdir);
                if !game_dir.exists() {
                    return Err(ResolveError::GameDirNotFound(game_dir.display().to_string()));
                }
                Ok(game_dir)
            }
        }
    }

    /// The game server executable: `<game_dir>/<basename>.sh` on POSIX,
    /// `<game_dir>/<basename>.exe` on Windows.
    pub fn executable(&self) -> Result<PathBuf, ResolveError> {
        let game_dir = self.game_dir()?;
        let base_name = game_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let extension = if cfg!(windows) { "exe" } else { "sh" };
        let exe = game_dir.join(format!("{base_name}.{extension}"));

        if !exe.exists() {
            return Err(ResolveError::ExecutableNotFound(exe.display().to_string()));
        }
        Ok(exe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_via_install_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let game_dir = tmp.path().join("PalServer");
        fs::create_dir_all(&game_dir).unwrap();
        let exe_name = if cfg!(windows) { "PalServer.exe" } else { "PalServer.sh" };
        fs::write(game_dir.join(exe_name), "").unwrap();

        let resolver = InstallResolver::new(
            2394010,
            InstallSource::InstallDir(game_dir.display().to_string()),
        );
        assert_eq!(resolver.game_dir().unwrap(), game_dir);
        assert_eq!(resolver.executable().unwrap(), game_dir.join(exe_name));
    }

    #[test]
    fn resolves_via_steam_path_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let steamapps = tmp.path().join("steamapps");
        let common = steamapps.join("common").join("PalServer");
        fs::create_dir_all(&common).unwrap();
        let exe_name = if cfg!(windows) { "PalServer.exe" } else { "PalServer.sh" };
        fs::write(common.join(exe_name), "").unwrap();

        fs::write(
            steamapps.join("appmanifest_2394010.acf"),
            r#"
            "AppState"
            {
                "appid"      "2394010"
                "installdir" "PalServer"
            }
            "#,
        )
        .unwrap();

        let resolver = InstallResolver::new(
            2394010,
            InstallSource::SteamPath(tmp.path().display().to_string()),
        );
        assert_eq!(resolver.game_dir().unwrap(), common);
        assert_eq!(resolver.executable().unwrap(), common.join(exe_name));
    }

    #[test]
    fn missing_manifest_is_resolve_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("steamapps")).unwrap();
        let resolver = InstallResolver::new(
            999,
            InstallSource::SteamPath(tmp.path().display().to_string()),
        );
        assert!(matches!(
            resolver.game_dir(),
            Err(ResolveError::ManifestNotFound { .. })
        ));
    }
}
