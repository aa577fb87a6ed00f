//! `aplane.token` — the bearer token the HTTP transport checks on every
//! request (spec §6). Generated once on first startup, then read back
//! unchanged on every later one.

use rand::RngCore;
use std::fs;
use std::io;
use std::path::Path;

const TOKEN_BYTES: usize = 32;

pub fn load_or_generate(path: &Path) -> io::Result<String> {
    if path.is_file() {
        check_permissions(path)?;
        let contents = fs::read_to_string(path)?;
        return Ok(contents.trim().to_string());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut raw = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    let token = hex::encode(raw);
    fs::write(path, &token)?;
    set_owner_only(path)?;
    tracing::info!(path = %path.display(), "generated new aplane.token");
    Ok(token)
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Warn (never reject) when the file is readable/writable beyond its
/// owner (spec §6: "permissions stricter than `0077` warn-then-accept;
/// exactly `0600` is recommended").
#[cfg(unix)]
fn check_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    if mode & 0o077 != 0 {
        tracing::warn!(
            path = %path.display(),
            mode = format!("{:o}", mode & 0o777),
            "aplane.token is readable or writable by group/other; 0600 is recommended"
        );
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_reloads_the_same_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aplane.token");
        let first = load_or_generate(&path).unwrap();
        let second = load_or_generate(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), TOKEN_BYTES * 2);
    }
}
