// to be called on startup and quit; saves the session params so the next run
// picks up where this one stopped
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::pipeline::params::Patch;

pub const BASALT_DIR: &str = ".basalt";
const SESSION_FILE: &str = "session.json";
pub const LOG_FILE: &str = "basalt.log";

// <dir>/.basalt/session.json
fn session_file_path(dir: &Path) -> PathBuf {
    dir.join(BASALT_DIR).join(SESSION_FILE)
}

// <dir>/.basalt/, created if needed
pub fn basalt_dir(dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join(BASALT_DIR);
    std::fs::create_dir_all(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    Ok(path)
}

// a missing or unreadable session is just a fresh start
pub fn load_session(dir: &Path) -> Option<Patch> {
    let path = session_file_path(dir);
    let data = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&data).ok()
}

// Save the session params to disk, making the files if they don't exist already
pub fn save_session(dir: &Path, patch: &Patch) -> anyhow::Result<()> {
    basalt_dir(dir)?;
    let json = serde_json::to_string_pretty(patch)?;
    std::fs::write(session_file_path(dir), json)?;
    Ok(())
}

// A params file is a flat JSON object; unlike the session it must parse
pub fn load_patch(path: &Path) -> anyhow::Result<Patch> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let patch = serde_json::from_str(&data)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(patch)
}
