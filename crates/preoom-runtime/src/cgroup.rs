//! Cgroup memory discovery and usage polling.
//!
//! Supports both hierarchies:
//!
//! | version | limit                                           | usage                           |
//! |---------|-------------------------------------------------|---------------------------------|
//! | v1      | `memory/memory.stat` `hierarchical_memory_limit` | `memory/memory.usage_in_bytes`  |
//! | v2      | `memory.max` (`max` = unlimited)                 | `memory.current`                |
//!
//! Discovery never fails hard. Anything missing, unreadable or unlimited
//! yields a [`Fallback`] and the caller runs the command unsupervised.
//! Once discovery succeeded, a bad usage read is a fatal [`Error`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use preoom_core::MemoryLimits;
use thiserror::Error as ThisError;

use crate::error::{Error, Result};

const V1_MEMORY_DIR: &str = "memory";
const V1_STAT: &str = "memory.stat";
const V1_USAGE: &str = "memory.usage_in_bytes";
const V1_LIMIT_KEY: &str = "hierarchical_memory_limit";
const V2_MAX: &str = "memory.max";
const V2_CURRENT: &str = "memory.current";

/// v1 reports "no limit" as `i64::MAX` rounded down to a page boundary.
const V1_UNLIMITED_SLACK: i64 = 1 << 16;

/// Which cgroup hierarchy is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    V1,
    V2,
}

/// A parsed hard limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardLimit {
    Bytes(i64),
    Unlimited,
}

/// Why supervision is skipped.
#[derive(Debug, ThisError)]
pub enum Fallback {
    #[error("cgroup root {} does not exist", .0.display())]
    NoCgroup(PathBuf),

    #[error("no cgroup memory controller detected under {}", .0.display())]
    NoMemoryController(PathBuf),

    #[error("no memory limit configured")]
    Unlimited,

    #[error("no hierarchical_memory_limit entry in {}", .0.display())]
    MissingLimit(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed memory limit {raw:?} in {}", path.display())]
    Malformed { path: PathBuf, raw: String },
}

/// Result of a successful discovery
#[derive(Debug)]
pub struct Supervised {
    pub version: CgroupVersion,
    pub limits: MemoryLimits,
    pub usage: UsageSource,
}

/// Open, rewindable handle on the live usage counter.
#[derive(Debug)]
pub struct UsageSource {
    file: File,
    path: PathBuf,
    buf: String,
}

impl UsageSource {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        Ok(Self {
            file,
            path,
            buf: String::with_capacity(32),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the counter from the start and parse its first line.
    pub fn read(&mut self) -> Result<i64> {
        self.buf.clear();
        if let Err(source) = self
            .file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut self.buf))
        {
            return Err(Error::UsageRead {
                path: self.path.clone(),
                source,
            });
        }
        parse_counter(&self.buf).ok_or_else(|| Error::UsageParse {
            path: self.path.clone(),
            raw: self.buf.trim().to_string(),
        })
    }
}

/// Locates the memory limit and usage counter under a cgroup mount.
#[derive(Debug, Clone)]
pub struct CgroupReader {
    root: PathBuf,
}

impl CgroupReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Detect the mounted hierarchy.
    pub fn detect(&self) -> std::result::Result<CgroupVersion, Fallback> {
        if !self.root.exists() {
            return Err(Fallback::NoCgroup(self.root.clone()));
        }
        if self.root.join(V1_MEMORY_DIR).is_dir() {
            Ok(CgroupVersion::V1)
        } else if self.root.join(V2_MAX).exists() {
            Ok(CgroupVersion::V2)
        } else {
            Err(Fallback::NoMemoryController(self.root.clone()))
        }
    }

    /// Find the hard limit, derive the soft threshold at `percent`, and
    /// open the usage counter.
    pub fn discover(&self, percent: f64) -> std::result::Result<Supervised, Fallback> {
        let version = self.detect()?;
        let (limit, usage_path) = match version {
            CgroupVersion::V1 => {
                let dir = self.root.join(V1_MEMORY_DIR);
                (self.read_v1_limit(&dir.join(V1_STAT))?, dir.join(V1_USAGE))
            }
            CgroupVersion::V2 => (
                self.read_v2_limit(&self.root.join(V2_MAX))?,
                self.root.join(V2_CURRENT),
            ),
        };
        let hard = match limit {
            HardLimit::Bytes(bytes) => bytes,
            HardLimit::Unlimited => return Err(Fallback::Unlimited),
        };
        let usage = UsageSource::open(&usage_path).map_err(|source| Fallback::Unreadable {
            path: usage_path.clone(),
            source,
        })?;
        Ok(Supervised {
            version,
            limits: MemoryLimits::new(hard, percent),
            usage,
        })
    }

    fn read_v1_limit(&self, stat: &Path) -> std::result::Result<HardLimit, Fallback> {
        let unreadable = |source| Fallback::Unreadable {
            path: stat.to_path_buf(),
            source,
        };
        let reader = BufReader::new(File::open(stat).map_err(unreadable)?);
        for line in reader.lines() {
            let line = line.map_err(unreadable)?;
            let mut fields = line.split_whitespace();
            if fields.next() != Some(V1_LIMIT_KEY) {
                continue;
            }
            let raw = fields.next().unwrap_or_default();
            return parse_v1_limit(raw).ok_or_else(|| Fallback::Malformed {
                path: stat.to_path_buf(),
                raw: raw.to_string(),
            });
        }
        Err(Fallback::MissingLimit(stat.to_path_buf()))
    }

    fn read_v2_limit(&self, max: &Path) -> std::result::Result<HardLimit, Fallback> {
        let contents = std::fs::read_to_string(max).map_err(|source| Fallback::Unreadable {
            path: max.to_path_buf(),
            source,
        })?;
        parse_v2_max(&contents).ok_or_else(|| Fallback::Malformed {
            path: max.to_path_buf(),
            raw: contents.trim().to_string(),
        })
    }
}

/// Parse the `hierarchical_memory_limit` value.
pub fn parse_v1_limit(raw: &str) -> Option<HardLimit> {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(-1) => Some(HardLimit::Unlimited),
        Ok(v) if v >= i64::MAX - V1_UNLIMITED_SLACK => Some(HardLimit::Unlimited),
        Ok(v) if v > 0 => Some(HardLimit::Bytes(v)),
        Ok(_) => None,
        // Beyond i64 still means "no limit"
        Err(_) => raw.parse::<u64>().ok().map(|_| HardLimit::Unlimited),
    }
}

/// Parse the first line of `memory.max`.
pub fn parse_v2_max(contents: &str) -> Option<HardLimit> {
    let first = contents.lines().next()?.trim();
    if first == "max" {
        return Some(HardLimit::Unlimited);
    }
    match first.parse::<i64>() {
        Ok(v) if v > 0 => Some(HardLimit::Bytes(v)),
        _ => None,
    }
}

fn parse_counter(contents: &str) -> Option<i64> {
    contents.lines().next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn v2_root(max: &str, current: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("memory.max"), max).unwrap();
        fs::write(dir.path().join("memory.current"), current).unwrap();
        dir
    }

    fn v1_root(stat: &str, usage: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mem = dir.path().join("memory");
        fs::create_dir(&mem).unwrap();
        fs::write(mem.join("memory.stat"), stat).unwrap();
        fs::write(mem.join("memory.usage_in_bytes"), usage).unwrap();
        dir
    }

    #[test]
    fn test_missing_root_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let reader = CgroupReader::new(dir.path().join("absent"));
        assert!(matches!(reader.discover(90.0), Err(Fallback::NoCgroup(_))));
    }

    #[test]
    fn test_no_memory_controller_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let reader = CgroupReader::new(dir.path());
        assert!(matches!(reader.discover(90.0), Err(Fallback::NoMemoryController(_))));
    }

    #[test]
    fn test_v2_limit_and_threshold() {
        let dir = v2_root("1000000\n", "4096\n");
        let reader = CgroupReader::new(dir.path());
        assert_eq!(reader.detect().unwrap(), CgroupVersion::V2);

        let mut supervised = reader.discover(90.0).unwrap();
        assert_eq!(supervised.version, CgroupVersion::V2);
        assert_eq!(supervised.limits.hard_limit_bytes, 1_000_000);
        assert_eq!(supervised.limits.soft_threshold_bytes, 900_000);
        assert_eq!(supervised.usage.read().unwrap(), 4096);
        assert!(!supervised.limits.is_breached_by(900_000));
        assert!(supervised.limits.is_breached_by(900_001));
    }

    #[test]
    fn test_v2_max_is_unlimited() {
        let dir = v2_root("max\n", "4096\n");
        let reader = CgroupReader::new(dir.path());
        assert!(matches!(reader.discover(90.0), Err(Fallback::Unlimited)));
    }

    #[test]
    fn test_v2_garbage_limit_falls_back() {
        let dir = v2_root("lots\n", "4096\n");
        let reader = CgroupReader::new(dir.path());
        assert!(matches!(reader.discover(90.0), Err(Fallback::Malformed { .. })));
    }

    #[test]
    fn test_v2_missing_current_falls_back() {
        let dir = v2_root("1000000\n", "0\n");
        fs::remove_file(dir.path().join("memory.current")).unwrap();
        let reader = CgroupReader::new(dir.path());
        assert!(matches!(reader.discover(90.0), Err(Fallback::Unreadable { .. })));
    }

    #[test]
    fn test_v1_limit_from_stat() {
        let stat = "cache 0\nrss 1024\nhierarchical_memory_limit 2000000\nhierarchical_memsw_limit 4000000\n";
        let dir = v1_root(stat, "12345\n");
        let reader = CgroupReader::new(dir.path());

        let mut supervised = reader.discover(50.0).unwrap();
        assert_eq!(supervised.version, CgroupVersion::V1);
        assert_eq!(supervised.limits.hard_limit_bytes, 2_000_000);
        assert_eq!(supervised.limits.soft_threshold_bytes, 1_000_000);
        assert_eq!(supervised.usage.read().unwrap(), 12345);
    }

    #[test]
    fn test_v1_unlimited_sentinels() {
        for raw in ["-1", "9223372036854775807", "9223372036854771712"] {
            let dir = v1_root(&format!("hierarchical_memory_limit {raw}\n"), "1\n");
            let reader = CgroupReader::new(dir.path());
            assert!(matches!(reader.discover(90.0), Err(Fallback::Unlimited)), "{raw}");
        }
    }

    #[test]
    fn test_v1_missing_entry_falls_back() {
        let dir = v1_root("cache 0\nrss 0\n", "1\n");
        let reader = CgroupReader::new(dir.path());
        assert!(matches!(reader.discover(90.0), Err(Fallback::MissingLimit(_))));
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_v1_limit("536870912"), Some(HardLimit::Bytes(536_870_912)));
        assert_eq!(parse_v1_limit("18446744073709551615"), Some(HardLimit::Unlimited));
        assert_eq!(parse_v1_limit("0"), None);
        assert_eq!(parse_v1_limit("abc"), None);
        assert_eq!(parse_v2_max("max"), Some(HardLimit::Unlimited));
        assert_eq!(parse_v2_max("268435456\n"), Some(HardLimit::Bytes(268_435_456)));
        assert_eq!(parse_v2_max(""), None);
    }

    #[test]
    fn test_usage_rereads_after_rewrite() {
        let dir = v2_root("1000000\n", "100\n");
        let mut usage = UsageSource::open(dir.path().join("memory.current")).unwrap();
        assert_eq!(usage.read().unwrap(), 100);

        fs::write(dir.path().join("memory.current"), "950000\n").unwrap();
        assert_eq!(usage.read().unwrap(), 950_000);
    }

    #[test]
    fn test_usage_garbage_is_fatal() {
        let dir = v2_root("1000000\n", "100\n");
        let mut usage = UsageSource::open(dir.path().join("memory.current")).unwrap();
        fs::write(dir.path().join("memory.current"), "corrupt\n").unwrap();
        assert!(matches!(usage.read(), Err(Error::UsageParse { .. })));
    }
}
