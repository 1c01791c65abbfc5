use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.yml";
const CONFIG_FILE: &str = "config.yml";

/// Access token from the last successful login or registration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub access_token: String,
    pub token_type: String,
}

/// Where the client keeps its files on this machine.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config: PathBuf,
    pub session: PathBuf,
    pub logs: PathBuf,
}

impl AppPaths {
    pub fn locate() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "taskcal").context("locating data directory")?;
        Ok(AppPaths {
            config: dirs.config_dir().join(CONFIG_FILE),
            session: dirs.data_dir().join(SESSION_FILE),
            logs: dirs.data_dir().join("logs"),
        })
    }
}

pub fn load_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let session: Session = serde_yaml::from_str(&data).context("parsing session file")?;
    Ok(Some(session))
}

pub fn save_session(path: &Path, session: &Session) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(session).context("serializing session")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

/// Removes the stored session. Returns whether one existed.
pub fn clear_session(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("removing {:?}", path))?;
    Ok(true)
}
