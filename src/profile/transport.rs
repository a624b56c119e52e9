//! Moving encoded profiles and their out-of-band secrets between processes.
//!
//! A profile and its ciphertext must never share a channel: profiles go
//! through [`write_profile`], ciphertext through [`write_secret`].

use crate::config::types::{DecodePolicy, LaunchError, Result};
use crate::profile::launch::SessionLaunchProfile;
use std::fs::OpenOptions;
#[cfg(unix)]
use std::fs::File;
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use std::os::unix::io::{FromRawFd, RawFd};
use std::path::Path;

/// Serialize a profile as JSON onto `writer`.
///
/// Fails with `PlaintextPassword` if the profile has not been encrypted.
pub fn write_profile<W: Write>(mut writer: W, profile: &SessionLaunchProfile) -> Result<()> {
    profile.ensure_transmittable()?;
    let payload = serde_json::to_vec(&profile.to_json())
        .map_err(|e| LaunchError::Process(format!("failed to encode profile: {e}")))?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read a JSON profile from `reader` until EOF and decode it under `policy`.
pub fn read_profile<R: Read>(mut reader: R, policy: DecodePolicy) -> Result<SessionLaunchProfile> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    let value: serde_json::Value = serde_json::from_slice(&data)
        .map_err(|e| LaunchError::Process(format!("failed to parse profile json: {e}")))?;
    SessionLaunchProfile::from_json_with_policy(&value, policy)
}

/// Write a profile to an inherited descriptor, taking ownership of it.
///
/// # Safety
///
/// `fd` must be an open descriptor owned by the caller and not used afterwards.
#[cfg(unix)]
pub unsafe fn write_profile_to_fd(fd: RawFd, profile: &SessionLaunchProfile) -> Result<()> {
    let file = File::from_raw_fd(fd);
    write_profile(file, profile)
}

/// Read a profile from an inherited descriptor, taking ownership of it.
///
/// # Safety
///
/// `fd` must be an open descriptor owned by the caller and not used afterwards.
#[cfg(unix)]
pub unsafe fn read_profile_from_fd(fd: RawFd, policy: DecodePolicy) -> Result<SessionLaunchProfile> {
    let file = File::from_raw_fd(fd);
    read_profile(file, policy)
}

/// Write out-of-band ciphertext to a new file with restrictive permissions.
///
/// Refuses to overwrite an existing file. `mode` only applies on Unix.
pub fn write_secret(path: &Path, encrypted_password: &str, mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    let mut file = options.open(path)?;
    file.write_all(encrypted_password.as_bytes())?;
    file.sync_all()?;
    log::debug!("Wrote out-of-band secret to {}", path.display());
    Ok(())
}

/// Read out-of-band ciphertext written by [`write_secret`].
pub fn read_secret(path: &Path) -> Result<String> {
    let secret = std::fs::read_to_string(path)?;
    Ok(secret.trim().to_string())
}
