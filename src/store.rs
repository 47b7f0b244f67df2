use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use time::{OffsetDateTime, macros::format_description};

use crate::{
    error::{Result, ScrapeError},
    record::ListingRecord,
    stats::PriceStatsSummary,
};

/// Files written at the end of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SavedSweep {
    pub records: PathBuf,
    pub info: PathBuf,
}

/// Record sets and summaries as files in one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<term>_<YYYYMMDD_HHMMSS>`, the shared prefix of a session's files.
    pub fn session_stem(search_term: &str, started_at: OffsetDateTime) -> String {
        let fmt = format_description!("[year][month][day]_[hour][minute][second]");
        let stamp = started_at
            .format(&fmt)
            .unwrap_or_else(|_| started_at.unix_timestamp().to_string());
        let term: String = search_term
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{term}_{stamp}")
    }

    pub fn save_url_plan(&self, stem: &str, urls: &[String]) -> Result<PathBuf> {
        let path = self.dir.join(format!("{stem}_urls.txt"));
        let mut body = urls.join("\n");
        body.push('\n');
        write(&path, body.as_bytes())?;
        Ok(path)
    }

    pub fn save_sweep(
        &self,
        stem: &str,
        pages_visited: usize,
        records: &[ListingRecord],
        summary: &PriceStatsSummary,
    ) -> Result<SavedSweep> {
        let base = format!("{stem}_p{pages_visited}");
        let records_path = self.dir.join(format!("{base}.json"));
        let info_path = self.dir.join(format!("{base}_info.txt"));

        write_records(&records_path, records)?;
        write(&info_path, summary.render().as_bytes())?;

        Ok(SavedSweep {
            records: records_path,
            info: info_path,
        })
    }
}

pub fn load_records(path: &Path) -> Result<Vec<ListingRecord>> {
    let raw = fs::read_to_string(path).map_err(|source| ScrapeError::Storage {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_records(path: &Path, records: &[ListingRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    write(path, json.as_bytes())
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ScrapeError::Storage {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| ScrapeError::Storage {
        path: path.to_path_buf(),
        source,
    })
}
