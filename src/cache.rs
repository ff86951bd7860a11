//! Compressed persistent file cache.
//!
//! One file per key on disk, each holding a JSON envelope of
//! `{cdata, compression_method, original_size, compressed_size, ttl,
//! timestamp}`. Entry age derives from file modification time at read
//! and prune time.
//!
//! Two pieces of process-wide state exist: the detected compression
//! method and the startup-prune latch. Both initialize lazily on first
//! cache construction and are never re-evaluated afterwards; tests can
//! reset them through [`reset_process_state`]. Concurrent writers from
//! independent processes race without coordination (last write wins);
//! callers needing multi-process consistency must add external locking.
//!
//! Past construction, every failure is contained: operations log and
//! report `false`/`None`, degrading the cache to "always miss" instead
//! of surfacing errors.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::CacheError;

/// Default entry lifetime: 31 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2_678_400);

const CACHE_EXTENSION: &str = "cache";

/// The fixed set of compression algorithm tags an entry may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Zstd,
    Lz4,
    None,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Zstd => write!(f, "zstd"),
            Compression::Lz4 => write!(f, "lz4"),
            Compression::None => write!(f, "none"),
        }
    }
}

/// On-disk record: compressed payload plus metadata.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    /// Base64 of the compressed serialized value.
    cdata: String,
    compression_method: Compression,
    original_size: u64,
    compressed_size: u64,
    /// Entry lifetime in seconds, from write time.
    ttl: u64,
    /// Write time as unix seconds.
    timestamp: i64,
}

/// Compression statistics for one cached entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionStats {
    pub compression_method: Compression,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Space saved as a percentage, rounded to 2 decimals.
    pub compression_ratio: f64,
    pub timestamp: i64,
}

#[derive(Default)]
struct ProcessState {
    compression: Option<Compression>,
    pruned: bool,
}

static PROCESS_STATE: Mutex<ProcessState> = Mutex::new(ProcessState {
    compression: None,
    pruned: false,
});

/// Resets the process-wide detection memo and prune latch.
///
/// Exists so tests can exercise detection and startup pruning more than
/// once per process; production code has no reason to call it.
#[doc(hidden)]
pub fn reset_process_state() {
    let mut state = PROCESS_STATE.lock().unwrap_or_else(|e| e.into_inner());
    state.compression = None;
    state.pruned = false;
}

/// The compression method in use for new entries, probed once per
/// process lifetime in preference order (most efficient first) and
/// memoized.
pub fn detect_compression_method() -> Compression {
    let mut state = PROCESS_STATE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(method) = state.compression {
        return method;
    }
    let method = probe_compression();
    debug!(method = %method, "detected cache compression method");
    state.compression = Some(method);
    method
}

/// Returns true exactly once per process: the caller that wins performs
/// the startup prune.
fn acquire_prune_latch() -> bool {
    let mut state = PROCESS_STATE.lock().unwrap_or_else(|e| e.into_inner());
    if state.pruned {
        false
    } else {
        state.pruned = true;
        true
    }
}

fn probe_compression() -> Compression {
    const PROBE: &[u8] = b"imdb-scraper compression probe";
    #[cfg(feature = "zstd")]
    {
        if compress(PROBE, Compression::Zstd)
            .and_then(|c| decompress(&c, Compression::Zstd, PROBE.len() as u64))
            .map_or(false, |restored| restored == PROBE)
        {
            return Compression::Zstd;
        }
    }
    #[cfg(feature = "lz4")]
    {
        if compress(PROBE, Compression::Lz4)
            .and_then(|c| decompress(&c, Compression::Lz4, PROBE.len() as u64))
            .map_or(false, |restored| restored == PROBE)
        {
            return Compression::Lz4;
        }
    }
    Compression::None
}

fn compress(data: &[u8], method: Compression) -> Option<Vec<u8>> {
    match method {
        #[cfg(feature = "zstd")]
        Compression::Zstd => zstd::encode_all(data, 3).ok(),
        #[cfg(feature = "lz4")]
        Compression::Lz4 => lz4::block::compress(data, None, false).ok(),
        Compression::None => Some(data.to_vec()),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn decompress(data: &[u8], method: Compression, original_size: u64) -> Option<Vec<u8>> {
    match method {
        #[cfg(feature = "zstd")]
        Compression::Zstd => zstd::decode_all(data).ok(),
        #[cfg(feature = "lz4")]
        Compression::Lz4 => lz4::block::decompress(data, Some(original_size as i32)).ok(),
        Compression::None => Some(data.to_vec()),
        #[allow(unreachable_patterns)]
        _ => {
            let _ = original_size;
            None
        }
    }
}

pub(crate) fn compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let ratio = (1.0 - compressed_size as f64 / original_size as f64) * 100.0;
    (ratio * 100.0).round() / 100.0
}

/// Key -> compressed payload store on a filesystem directory.
pub struct Cache {
    dir: PathBuf,
    method: Compression,
}

impl Cache {
    /// Opens (creating if needed) the cache at `dir`. Fails only if the
    /// directory cannot be created or written; the first construction
    /// per process also detects the compression method and prunes
    /// expired entries.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        ensure_writable(&dir)?;

        let method = detect_compression_method();
        if acquire_prune_latch() {
            prune_dir(&dir, DEFAULT_TTL);
        }

        Ok(Self { dir, method })
    }

    /// Cache pinned to a specific compression method, bypassing
    /// detection. Used by tests to cover every algorithm.
    #[doc(hidden)]
    pub fn with_method(dir: impl Into<PathBuf>, method: Compression) -> Result<Self, CacheError> {
        let dir = dir.into();
        ensure_writable(&dir)?;
        Ok(Self { dir, method })
    }

    pub fn compression_method(&self) -> Compression {
        self.method
    }

    /// Serializes, compresses and writes `value` under `key`. A zero or
    /// absent TTL falls back to the default. Returns false on any
    /// failure; never errors out.
    pub fn add<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let raw = match serde_json::to_vec(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "cache add: serialization failed");
                return false;
            }
        };

        // Fall back to storing uncompressed if the backend misbehaves,
        // tagged accordingly so reads stay correct.
        let (payload, method) = match compress(&raw, self.method) {
            Some(payload) => (payload, self.method),
            None => {
                warn!(key, method = %self.method, "cache add: compression failed, storing raw");
                (raw.clone(), Compression::None)
            }
        };

        let envelope = Envelope {
            compressed_size: payload.len() as u64,
            cdata: BASE64.encode(&payload),
            compression_method: method,
            original_size: raw.len() as u64,
            ttl: effective_ttl(ttl).as_secs(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let encoded = match serde_json::to_vec(&envelope) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "cache add: envelope encoding failed");
                return false;
            }
        };

        match fs::write(self.file_for(key), encoded) {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "cache add: write failed");
                false
            }
        }
    }

    /// Reads the entry under `key`. Absent or expired entries yield
    /// `None`. Entries decompress with their *stored* method tag, so
    /// entries written under a different method remain readable. An
    /// entry without a recognizable envelope (legacy or foreign) is
    /// deserialized from its raw bytes unchanged.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.has(key) {
            return None;
        }
        let path = self.file_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key, error = %err, "cache get: read failed");
                return None;
            }
        };

        match serde_json::from_slice::<Envelope>(&bytes) {
            Ok(envelope) => {
                let payload = match BASE64.decode(&envelope.cdata) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(key, error = %err, "cache get: payload decode failed");
                        return None;
                    }
                };
                let raw = match decompress(
                    &payload,
                    envelope.compression_method,
                    envelope.original_size,
                ) {
                    Some(raw) => raw,
                    None => {
                        warn!(key, method = %envelope.compression_method,
                              "cache get: decompression failed");
                        return None;
                    }
                };
                match serde_json::from_slice(&raw) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!(key, error = %err, "cache get: deserialization failed");
                        None
                    }
                }
            }
            // Backward compatibility: entries written without the
            // metadata envelope come back as their raw stored value.
            Err(_) => serde_json::from_slice(&bytes).ok(),
        }
    }

    /// True iff an entry exists and has not exceeded its TTL.
    pub fn has(&self, key: &str) -> bool {
        let path = self.file_for(key);
        let Some(age) = entry_age(&path) else {
            return false;
        };
        let ttl = fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Envelope>(&bytes).ok())
            .map(|envelope| Duration::from_secs(envelope.ttl))
            .unwrap_or(DEFAULT_TTL);
        age <= ttl
    }

    /// Removes the entry under `key`.
    pub fn delete(&self, key: &str) -> bool {
        match fs::remove_file(self.file_for(key)) {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "cache delete failed");
                false
            }
        }
    }

    /// Removes every entry. Individual deletion failures are logged and
    /// skipped; only a failed directory scan reports overall failure.
    pub fn clear(&self) -> bool {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %self.dir.display(), error = %err, "cache clear: scan failed");
                return false;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXTENSION) {
                if let Err(err) = fs::remove_file(&path) {
                    warn!(file = %path.display(), error = %err, "cache clear: delete failed");
                }
            }
        }
        true
    }

    /// Compression statistics for the entry under `key`; `None` when
    /// the entry is missing, expired, or carries no metadata envelope.
    pub fn compression_stats(&self, key: &str) -> Option<CompressionStats> {
        if !self.has(key) {
            return None;
        }
        let bytes = fs::read(self.file_for(key)).ok()?;
        let envelope = serde_json::from_slice::<Envelope>(&bytes).ok()?;
        Some(CompressionStats {
            compression_method: envelope.compression_method,
            original_size: envelope.original_size,
            compressed_size: envelope.compressed_size,
            compression_ratio: compression_ratio(envelope.original_size, envelope.compressed_size),
            timestamp: envelope.timestamp,
        })
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), CACHE_EXTENSION))
    }
}

fn effective_ttl(ttl: Option<Duration>) -> Duration {
    match ttl {
        Some(ttl) if !ttl.is_zero() => ttl,
        _ => DEFAULT_TTL,
    }
}

fn entry_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

fn ensure_writable(dir: &Path) -> Result<(), CacheError> {
    let check = || -> std::io::Result<()> {
        fs::create_dir_all(dir)?;
        let probe = dir.join(".write-probe");
        let mut file = fs::File::create(&probe)?;
        file.write_all(b"ok")?;
        drop(file);
        fs::remove_file(&probe)?;
        Ok(())
    };
    check().map_err(|source| CacheError::DirectoryUnwritable {
        path: dir.display().to_string(),
        source,
    })
}

/// Deletes entries older than `ttl`, by file modification time.
///
/// Always called with the default TTL: per-entry overrides are
/// deliberately ignored here, so a long-lived entry can be pruned
/// early.
/// Per-file failures are logged and skipped; a failed directory scan
/// turns pruning into a no-op.
pub(crate) fn prune_dir(dir: &Path, ttl: Duration) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cache prune: scan failed");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(CACHE_EXTENSION) {
            continue;
        }
        if entry_age(&path).map_or(false, |age| age > ttl) {
            if let Err(err) = fs::remove_file(&path) {
                warn!(file = %path.display(), error = %err, "cache prune: delete failed");
            } else {
                debug!(file = %path.display(), "cache prune: removed expired entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs::File;
    use tempfile::TempDir;

    fn temp_cache(method: Compression) -> (TempDir, Cache) {
        let dir = TempDir::new().unwrap();
        let cache = Cache::with_method(dir.path(), method).unwrap();
        (dir, cache)
    }

    fn methods() -> Vec<Compression> {
        let mut methods = vec![Compression::None];
        if cfg!(feature = "zstd") {
            methods.push(Compression::Zstd);
        }
        if cfg!(feature = "lz4") {
            methods.push(Compression::Lz4);
        }
        methods
    }

    #[test]
    fn test_roundtrip_every_method() {
        let value = json!({
            "property": "value",
            "nested": {"key": ["a", "b", "c"]},
            "boolean": true,
            "integer": 1,
            "float": 1.1
        });
        for method in methods() {
            let (_dir, cache) = temp_cache(method);
            assert!(cache.add("test", &value, None), "{method}");
            assert_eq!(cache.get::<serde_json::Value>("test"), Some(value.clone()));
        }
    }

    #[test]
    fn test_has_and_delete() {
        let (_dir, cache) = temp_cache(Compression::None);
        cache.add("present", &json!({"key": "value"}), None);
        assert!(cache.has("present"));
        assert!(!cache.has("absent"));
        assert!(cache.delete("present"));
        assert!(!cache.has("present"));
    }

    #[test]
    fn test_entries_readable_across_methods() {
        // An entry written under one method stays readable by a cache
        // instance using another: decompression follows the stored tag.
        let dir = TempDir::new().unwrap();
        for method in methods() {
            let writer = Cache::with_method(dir.path(), method).unwrap();
            assert!(writer.add("shared", &json!(["x", "y"]), None));
            let reader = Cache::with_method(dir.path(), Compression::None).unwrap();
            assert_eq!(
                reader.get::<serde_json::Value>("shared"),
                Some(json!(["x", "y"]))
            );
        }
    }

    #[test]
    fn test_ttl_expiry() {
        let (_dir, cache) = temp_cache(Compression::None);
        cache.add("short", &json!(1), Some(Duration::from_secs(1)));
        assert!(cache.has("short"));
        assert_eq!(cache.get::<i64>("short"), Some(1));
        std::thread::sleep(Duration::from_millis(1200));
        assert!(!cache.has("short"));
        assert_eq!(cache.get::<i64>("short"), None);
    }

    #[test]
    fn test_zero_ttl_falls_back_to_default() {
        assert_eq!(effective_ttl(Some(Duration::ZERO)), DEFAULT_TTL);
        assert_eq!(effective_ttl(None), DEFAULT_TTL);
        assert_eq!(
            effective_ttl(Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_legacy_entry_without_envelope() {
        let (_dir, cache) = temp_cache(Compression::None);
        // A foreign writer left plain JSON at the key's path.
        let path = cache.file_for("legacy");
        fs::write(&path, br#"{"plain": "stored"}"#).unwrap();
        assert_eq!(
            cache.get::<serde_json::Value>("legacy"),
            Some(json!({"plain": "stored"}))
        );
        assert!(cache.compression_stats("legacy").is_none());
    }

    #[test]
    fn test_compression_stats() {
        let value = json!({"plot": "x".repeat(4096)});
        for method in methods() {
            let (_dir, cache) = temp_cache(method);
            cache.add("stats", &value, None);
            let stats = cache.compression_stats("stats").unwrap();
            assert_eq!(stats.compression_method, method);
            assert_eq!(
                stats.compression_ratio,
                compression_ratio(stats.original_size, stats.compressed_size)
            );
            if method != Compression::None {
                assert!(stats.compressed_size < stats.original_size);
                assert!(stats.compression_ratio > 0.0);
            }
        }
        assert!(temp_cache(Compression::None)
            .1
            .compression_stats("missing")
            .is_none());
    }

    #[test]
    fn test_compression_ratio_formula() {
        assert_eq!(compression_ratio(1000, 250), 75.0);
        assert_eq!(compression_ratio(3, 1), 66.67);
        // Guard against division by zero.
        assert_eq!(compression_ratio(0, 0), 0.0);
        assert_eq!(compression_ratio(0, 10), 0.0);
    }

    #[test]
    fn test_clear_removes_only_cache_files() {
        let (dir, cache) = temp_cache(Compression::None);
        cache.add("one", &json!(1), None);
        cache.add("two", &json!(2), None);
        let other = dir.path().join("keep.txt");
        fs::write(&other, "keep").unwrap();
        assert!(cache.clear());
        assert!(!cache.has("one"));
        assert!(!cache.has("two"));
        assert!(other.exists());
    }

    // Tests that reset the process-wide state must not interleave with
    // each other; the harness runs tests concurrently by default.
    static PROCESS_STATE_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_detection_is_memoized() {
        let _guard = PROCESS_STATE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_process_state();
        let first = detect_compression_method();
        let second = detect_compression_method();
        assert_eq!(first, second);
        if cfg!(feature = "zstd") {
            assert_eq!(first, Compression::Zstd);
        } else if cfg!(feature = "lz4") {
            assert_eq!(first, Compression::Lz4);
        } else {
            assert_eq!(first, Compression::None);
        }
    }

    fn backdate(path: &Path, by: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_prune_ignores_per_entry_ttl_override() {
        // Pruning always applies the default TTL, even to entries
        // written with a longer override.
        let (_dir, cache) = temp_cache(Compression::None);
        let long_ttl = Some(Duration::from_secs(365 * 24 * 3600));
        cache.add("long-lived", &json!(1), long_ttl);
        cache.add("fresh", &json!(2), None);
        backdate(
            &cache.file_for("long-lived"),
            DEFAULT_TTL + Duration::from_secs(3600),
        );

        prune_dir(&cache.dir, DEFAULT_TTL);
        assert!(!cache.file_for("long-lived").exists());
        assert!(cache.has("fresh"));
    }

    #[test]
    fn test_prune_on_missing_directory_is_noop() {
        prune_dir(Path::new("/nonexistent/imdb-scraper-cache"), DEFAULT_TTL);
    }

    #[test]
    fn test_startup_prune_runs_once_per_process() {
        let _guard = PROCESS_STATE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_process_state();
        let dir = TempDir::new().unwrap();
        let stale = {
            let cache = Cache::with_method(dir.path(), Compression::None).unwrap();
            cache.add("stale", &json!(1), None);
            cache.file_for("stale")
        };
        backdate(&stale, DEFAULT_TTL + Duration::from_secs(3600));

        // First construction holds the latch and prunes.
        let _cache = Cache::new(dir.path()).unwrap();
        assert!(!stale.exists());

        // A later construction must not prune again.
        let survivor = {
            let cache = Cache::with_method(dir.path(), Compression::None).unwrap();
            cache.add("survivor", &json!(2), None);
            cache.file_for("survivor")
        };
        backdate(&survivor, DEFAULT_TTL + Duration::from_secs(3600));
        let _cache = Cache::new(dir.path()).unwrap();
        assert!(survivor.exists());
    }
}
