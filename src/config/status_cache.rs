//! File-backed status cache.
//!
//! One JSON file per key under a cache directory, so a job started by one
//! process can be polled from another. Writes go to a temp file and are
//! renamed into place, which keeps readers from ever seeing a partial
//! entry. Expired entries are removed when read.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::jobs::cache::{to_delta, Clock, StatusCache, SystemClock};

/// Stored form of one cache entry.
#[derive(Debug, Deserialize, Serialize)]
struct CacheFile {
    value: String,
    /// Unix milliseconds.
    expires_at: i64,
}

/// [`StatusCache`] over a directory of JSON files.
pub struct FileStatusCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStatusCache {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { dir, clock }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        sanitize_key(key).map(|k| self.dir.join(format!("{k}.json")))
    }
}

/// Encode a key as a filename.
///
/// Bytes outside `[A-Za-z0-9_.-]` become `%XX`, so distinct keys never
/// share a file.
fn sanitize_key(key: &str) -> Option<String> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        let plain = byte.is_ascii_alphanumeric()
            || matches!(byte, b'_' | b'-')
            || (byte == b'.' && !encoded.is_empty());
        if plain {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    Some(encoded)
}

impl StatusCache for FileStatusCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(path) = self.path_for(key) else {
            return Ok(None);
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheFile = serde_json::from_str(&content)?;

        if entry.expires_at <= self.clock.now().timestamp_millis() {
            // Stale entry; removal is best effort.
            let _ = fs::remove_file(&path);
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let Some(file_path) = self.path_for(key) else {
            return Err(crate::error::Error::InvalidArgument(
                "cache key cannot be empty".into(),
            ));
        };
        fs::create_dir_all(&self.dir)?;

        let entry = CacheFile {
            value: value.to_string(),
            expires_at: (self.clock.now() + to_delta(ttl)).timestamp_millis(),
        };
        let json = serde_json::to_string_pretty(&entry)?;

        // Unique per write: concurrent sets on one key must not share a temp file.
        let mut temp_name = file_path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let temp_path = file_path.with_file_name(temp_name);

        {
            let mut opts = fs::OpenOptions::new();
            opts.write(true).create(true).truncate(true);
            #[cfg(unix)]
            opts.mode(0o600);
            let mut file = opts.open(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.flush()?;
        }
        fs::rename(&temp_path, &file_path)?;
        Ok(())
    }
}
