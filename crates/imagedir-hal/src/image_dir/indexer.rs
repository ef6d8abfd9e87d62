//! Directory indexer: turns a directory snapshot into a chronological
//! [`ImageSet`].
//!
//! Each file matching the configured extension gets an ordering key, tried
//! in this order:
//!
//! 1. a timestamp prefix such as `2025-10-09T15_27_01.690Z_<anything>`
//!    (milliseconds optional, the `Z` is mandatory, impossible calendar
//!    values do not match),
//! 2. a run of digits right before the extension (`img_0042.jpg` → 42).
//!
//! The directory is then ordered by whichever key kind is more common, with
//! ties going to timestamps. Files without a key of the winning kind are left
//! out and logged.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use imagedir_types::CameraError;
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Key used to place one file in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingKey {
    Timestamp(DateTime<Utc>),
    Numeric(u64),
}

/// How a directory's files are sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingMode {
    Timestamp,
    Numeric,
}

/// Immutable, ordered snapshot of one image directory.
///
/// Rebuilt wholesale on every reconfiguration and never mutated in place.
#[derive(Debug, Clone)]
pub struct ImageSet {
    dir: PathBuf,
    files: Vec<String>,
    mode: Option<OrderingMode>,
    matched: usize,
    skipped: Vec<String>,
}

impl ImageSet {
    /// Scan `dir` for files ending in `.ext` (case-insensitive) and order
    /// them.
    ///
    /// An empty result is not an error here; callers decide whether an
    /// empty set is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::DirectoryMissing`] if `dir` is not a directory.
    pub fn scan(dir: &Path, ext: &str) -> Result<Self, CameraError> {
        if !dir.is_dir() {
            return Err(CameraError::DirectoryMissing(dir.to_path_buf()));
        }

        let mut names = Vec::new();
        let mut unnamed = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.path().is_file() || !has_extension(entry.path(), ext) {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) => names.push(name.to_owned()),
                None => {
                    let lossy = entry.file_name().to_string_lossy().into_owned();
                    warn!(file = %lossy, "file name is not valid UTF-8; skipping");
                    unnamed.push(lossy);
                }
            }
        }
        names.sort();

        let mut set = Self::from_names(dir, names);
        set.matched += unnamed.len();
        set.skipped.extend(unnamed);
        Ok(set)
    }

    /// Order an already-listed set of file names belonging to `dir`.
    pub fn from_names(dir: &Path, names: Vec<String>) -> Self {
        let matched = names.len();
        let mut timestamped: Vec<(DateTime<Utc>, String)> = Vec::new();
        let mut numbered: Vec<(u64, String)> = Vec::new();
        let mut skipped = Vec::new();

        for name in names {
            match ordering_key(&name) {
                Some(OrderingKey::Timestamp(ts)) => timestamped.push((ts, name)),
                Some(OrderingKey::Numeric(n)) => numbered.push((n, name)),
                None => {
                    warn!(file = %name, "no timestamp or numeric index in file name; skipping");
                    skipped.push(name);
                }
            }
        }

        let mode = choose_mode(timestamped.len(), numbered.len());
        let files = match mode {
            Some(OrderingMode::Timestamp) => {
                drop_other_mode(&mut skipped, numbered.into_iter().map(|(_, n)| n), "numeric");
                sorted_names(timestamped)
            }
            Some(OrderingMode::Numeric) => {
                drop_other_mode(&mut skipped, timestamped.into_iter().map(|(_, n)| n), "timestamp");
                sorted_names(numbered)
            }
            None => Vec::new(),
        };

        debug!(dir = %dir.display(), count = files.len(), ?mode, "indexed image directory");

        Self {
            dir: dir.to_path_buf(),
            files,
            mode,
            matched,
            skipped,
        }
    }

    /// Directory the snapshot was taken of.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ordered file names.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn mode(&self) -> Option<OrderingMode> {
        self.mode
    }

    /// Number of files that matched the extension filter, keyed or not.
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Files that matched the extension but were left out of the ordering.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Full path of the file at `index`.
    pub fn path(&self, index: usize) -> Option<PathBuf> {
        self.files.get(index).map(|name| self.dir.join(name))
    }
}

/// Compute the ordering key for one file name.
pub fn ordering_key(file_name: &str) -> Option<OrderingKey> {
    parse_timestamp(file_name)
        .map(OrderingKey::Timestamp)
        .or_else(|| numeric_suffix(file_name).map(OrderingKey::Numeric))
}

/// Parse a leading `YYYY-MM-DDTHH_MM_SS[.mmm]Z` timestamp.
///
/// Returns `None` both when the pattern is absent and when it encodes an
/// impossible date or time.
pub fn parse_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    static TIMESTAMP_RE: OnceLock<Regex> = OnceLock::new();
    let re = TIMESTAMP_RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2})_(\d{2})_(\d{2})(?:\.(\d{3}))?Z")
            .expect("timestamp pattern is valid")
    });

    let caps = re.captures(file_name)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let (month, day) = (field(2)?, field(3)?);
    let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);
    let millis = field(7).unwrap_or(0);

    let parsed = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_milli_opt(hour, minute, second, millis));
    if parsed.is_none() {
        warn!(file = %file_name, "timestamp prefix holds an invalid date or time");
    }
    parsed.map(|naive| naive.and_utc())
}

/// Trailing digits of the file stem, e.g. `frame_017.png` → 17.
pub fn numeric_suffix(file_name: &str) -> Option<u64> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    stem[digits_start..].parse().ok()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn choose_mode(timestamped: usize, numbered: usize) -> Option<OrderingMode> {
    if timestamped > 0 && timestamped >= numbered {
        Some(OrderingMode::Timestamp)
    } else if numbered > 0 {
        Some(OrderingMode::Numeric)
    } else {
        None
    }
}

fn drop_other_mode(
    skipped: &mut Vec<String>,
    names: impl Iterator<Item = String>,
    kind: &str,
) {
    for name in names {
        warn!(file = %name, kind, "file uses the minority ordering key; skipping");
        skipped.push(name);
    }
}

/// Sort by key, then by file name for equal keys.
fn sorted_names<K: Ord>(mut keyed: Vec<(K, String)>) -> Vec<String> {
    keyed.sort();
    keyed.into_iter().map(|(_, name)| name).collect()
}
