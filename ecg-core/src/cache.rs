//! Content-addressed cache for raw VLM responses (spec.md §5).
//!
//! Keyed by a hash of image bytes + provider/model tag + prompt revision, so
//! repeated runs over the same image skip the remote call. This is the only
//! shared mutable resource in the pipeline; it is passed into the Image
//! Analyzer as an explicit handle, never held as an ambient singleton.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};

/// Compute the cache key for a given image buffer, provider tag and prompt
/// revision. Two requests that would produce the same `analyze()` call
/// collide on this key, which is what makes single-flight possible at the
/// call site (the server layer serializes access per key).
pub fn response_cache_key(image_bytes: &[u8], provider_tag: &str, model_tag: &str, prompt_revision: &str) -> u64 {
    let mut buf = Vec::with_capacity(image_bytes.len() + provider_tag.len() + model_tag.len() + prompt_revision.len() + 3);
    buf.extend_from_slice(image_bytes);
    buf.push(0);
    buf.extend_from_slice(provider_tag.as_bytes());
    buf.push(0);
    buf.extend_from_slice(model_tag.as_bytes());
    buf.push(0);
    buf.extend_from_slice(prompt_revision.as_bytes());
    xxh3_64(&buf)
}

/// File-based cache for raw VLM responses, one JSON document per key.
pub struct ResponseCache {
    cache_dir: PathBuf,
}

impl ResponseCache {
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn path_for(&self, key: u64) -> PathBuf {
        self.cache_dir.join(format!("{:016x}.json", key))
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: u64) -> Option<T> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }
        let file = File::open(&path).ok()?;
        serde_json::from_reader(BufReader::new(file)).ok()
    }

    pub fn put<T: Serialize>(&self, key: u64, value: &T) -> Result<()> {
        let path = self.path_for(key);
        let file = File::create(&path)?;
        serde_json::to_writer(BufWriter::new(file), value).map_err(Error::from)
    }

    pub fn invalidate(&self, key: u64) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut entry_count = 0u64;
        let mut total_size_bytes = 0u64;
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                entry_count += 1;
                total_size_bytes += entry.metadata()?.len();
            }
        }
        Ok(CacheStats { entry_count, total_size_bytes })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub total_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        confidence: f64,
        provider: String,
    }

    #[test]
    fn roundtrip_through_filesystem() {
        let tmp = TempDir::new().unwrap();
        let cache = ResponseCache::new(tmp.path()).unwrap();
        let key = response_cache_key(b"pixelbytes", "tier1-fast", "v3", "prompt-2026-01");

        assert!(cache.get::<Dummy>(key).is_none());

        let value = Dummy { confidence: 0.92, provider: "tier1-fast".into() };
        cache.put(key, &value).unwrap();

        let retrieved: Dummy = cache.get(key).unwrap();
        assert_eq!(retrieved, value);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn same_inputs_same_key() {
        let a = response_cache_key(b"same-image", "tierA", "m1", "p1");
        let b = response_cache_key(b"same-image", "tierA", "m1", "p1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_provider_different_key() {
        let a = response_cache_key(b"same-image", "tierA", "m1", "p1");
        let b = response_cache_key(b"same-image", "tierB", "m1", "p1");
        assert_ne!(a, b);
    }

    #[test]
    fn invalidate_removes_entry() {
        let tmp = TempDir::new().unwrap();
        let cache = ResponseCache::new(tmp.path()).unwrap();
        let key = response_cache_key(b"img", "t", "m", "p");
        cache.put(key, &Dummy { confidence: 0.5, provider: "t".into() }).unwrap();
        cache.invalidate(key).unwrap();
        assert!(cache.get::<Dummy>(key).is_none());
    }
}
