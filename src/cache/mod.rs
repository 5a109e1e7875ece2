//! Persistent transform cache.
//!
//! Stores the output of cacheable stages keyed by the hash of the stage
//! options and the input bytes.
//!
//! # Layout
//!
//! ```text
//! .routepack/cache/
//!   3f/3fa9...e1.bin    # blake3(payload) ++ payload
//! ```
//!
//! An entry whose checksum does not match is removed and reported as a
//! miss, so a damaged cache only costs time.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::debug;
use crate::pipeline::TransformStage;
use crate::utils::hash::ContentHash;

const CHECKSUM_LEN: usize = 32;

/// On-disk cache of transformed bytes.
#[derive(Debug, Clone)]
pub struct TransformCache {
    dir: PathBuf,
    enabled: bool,
}

impl TransformCache {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Key for running `stage` over `source`.
    pub fn key(stage: &TransformStage, source: &[u8]) -> ContentHash {
        let options = stage.key();
        ContentHash::of_parts([options.as_bytes(), source])
    }

    fn entry_path(&self, key: ContentHash) -> PathBuf {
        let hex = key.to_hex();
        self.dir.join(&hex[..2]).join(format!("{hex}.bin"))
    }

    /// Look up a cached result.
    pub fn get(&self, key: ContentHash) -> Option<Vec<u8>> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(key);
        let data = fs::read(&path).ok()?;

        match verify(&data) {
            Some(payload) => Some(payload.to_vec()),
            None => {
                debug!("cache"; "dropping corrupt entry {}", path.display());
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Store a result. Failures are logged and otherwise ignored.
    pub fn put(&self, key: ContentHash, payload: &[u8]) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.write_entry(key, payload) {
            debug!("cache"; "failed to store entry: {}", e);
        }
    }

    fn write_entry(&self, key: ContentHash, payload: &[u8]) -> io::Result<()> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut data = Vec::with_capacity(CHECKSUM_LEN + payload.len());
        data.extend_from_slice(ContentHash::of(payload).as_bytes());
        data.extend_from_slice(payload);

        // Write then rename so concurrent readers never see half an entry
        let tmp = path.with_extension(format!("tmp{}", std::process::id()));
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &path)
    }
}

/// Split an entry into its payload if the checksum holds.
fn verify(data: &[u8]) -> Option<&[u8]> {
    if data.len() < CHECKSUM_LEN {
        return None;
    }
    let (checksum, payload) = data.split_at(CHECKSUM_LEN);
    (ContentHash::of(payload).as_bytes() == checksum).then_some(payload)
}
