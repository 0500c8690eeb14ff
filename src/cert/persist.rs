//! Writing issued certificates and keys to disk.
//!
//! The certificate is written first, then the key. A failure part way leaves
//! whatever was already written in place. With atomic writes each file is
//! staged next to its destination and renamed over it, so a reader never sees
//! a half-written file.

use crate::error::{GenCertError, IoStep, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Permissions of the private key file on Unix.
pub const KEY_FILE_MODE: u32 = 0o600;

/// Permissions of an atomically written certificate file on Unix.
pub const CERT_FILE_MODE: u32 = 0o644;

/// Where the certificate and key ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifacts {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

fn io_error(step: IoStep, path: &Path) -> impl FnOnce(std::io::Error) -> GenCertError + '_ {
    move |source| GenCertError::FileIo {
        step,
        path: path.to_path_buf(),
        source,
    }
}

fn write_and_close(mut file: File, path: &Path, contents: &[u8]) -> Result<()> {
    file.write_all(contents)
        .map_err(io_error(IoStep::Write, path))?;
    file.sync_all().map_err(io_error(IoStep::Close, path))
}

/// Create or truncate `path` and write `contents` to it.
///
/// `mode` is applied when the file is created on Unix and ignored elsewhere.
pub fn write_file(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = mode {
            options.mode(mode);
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    let file = options.open(path).map_err(io_error(IoStep::Open, path))?;
    write_and_close(file, path, contents)
}

/// Stage `contents` in a temporary file beside `path`, then rename it into place.
pub fn write_file_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::NamedTempFile::new_in(dir).map_err(io_error(IoStep::Open, path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(io_error(IoStep::Open, path))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = staged.as_file();
    file.write_all(contents)
        .map_err(io_error(IoStep::Write, path))?;
    file.sync_all().map_err(io_error(IoStep::Close, path))?;

    staged
        .persist(path)
        .map_err(|e| io_error(IoStep::Close, path)(e.error))?;
    Ok(())
}

/// Write the certificate PEM and then the key PEM into `dest`.
///
/// # Arguments
///
/// * `dest` - Existing output directory
/// * `cert_file_name` / `key_file_name` - File names inside `dest`
/// * `atomic` - Stage and rename instead of writing in place
pub fn persist(
    dest: &Path,
    cert_file_name: &str,
    cert_pem: &str,
    key_file_name: &str,
    key_pem: &str,
    atomic: bool,
) -> Result<PersistedArtifacts> {
    let cert_path = dest.join(cert_file_name);
    let key_path = dest.join(key_file_name);

    if atomic {
        write_file_atomic(&cert_path, cert_pem.as_bytes(), CERT_FILE_MODE)?;
        debug!(path = %cert_path.display(), "wrote certificate");
        write_file_atomic(&key_path, key_pem.as_bytes(), KEY_FILE_MODE)?;
    } else {
        write_file(&cert_path, cert_pem.as_bytes(), None)?;
        debug!(path = %cert_path.display(), "wrote certificate");
        write_file(&key_path, key_pem.as_bytes(), Some(KEY_FILE_MODE))?;
    }
    debug!(path = %key_path.display(), "wrote private key");

    Ok(PersistedArtifacts {
        cert_path,
        key_path,
    })
}
