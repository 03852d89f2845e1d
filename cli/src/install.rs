use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

/// `~/.local/bin`, where `install` puts scripts by default.
pub fn default_install_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("no home directory"))?;
    Ok(home.join(".local").join("bin"))
}

/// Local file name for a remote script path: its last segment.
pub fn local_name(remote: &str) -> Result<&str> {
    remote
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .ok_or_else(|| anyhow!("{:?} does not name a script", remote))
}

/// Writes `contents` to `dir/<basename of remote>` and returns the path.
pub fn save(dir: &Path, remote: &str, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let target = dir.join(local_name(remote)?);
    fs::write(&target, contents)?;
    Ok(target)
}

/// Like `save`, then marks the file executable.
pub fn install(dir: &Path, remote: &str, contents: &str) -> Result<PathBuf> {
    let target = save(dir, remote, contents)?;
    make_executable(&target)?;
    Ok(target)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
