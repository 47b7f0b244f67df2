// -------------------------
// Detail enrichment
// -------------------------
//
// Revisits stored links one by one and folds the detail page back into the
// record with the same link. A failed page is skipped, not fatal.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    diagnostics::{Diagnostic, DiagnosticsSink},
    error::{Result, ScrapeError},
    extract::{DetailExtractor, DetailPage},
    fetch::PageSource,
    record::{DetailFields, ListingRecord},
    store::{load_records, write_records},
};

/// How many linked records to enrich. Accepts `"all"`, `"max"` or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCount", into = "RawCount")]
pub enum EnrichCount {
    All,
    Limit(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawCount {
    Number(usize),
    Text(String),
}

impl TryFrom<RawCount> for EnrichCount {
    type Error = ScrapeError;

    fn try_from(raw: RawCount) -> Result<Self> {
        match raw {
            RawCount::Number(n) => Ok(Self::Limit(n)),
            RawCount::Text(s) => s.parse(),
        }
    }
}

impl From<EnrichCount> for RawCount {
    fn from(count: EnrichCount) -> Self {
        match count {
            EnrichCount::All => RawCount::Text("all".to_string()),
            EnrichCount::Limit(n) => RawCount::Number(n),
        }
    }
}

impl FromStr for EnrichCount {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case("max") {
            return Ok(Self::All);
        }
        s.parse::<usize>()
            .map(Self::Limit)
            .map_err(|_| ScrapeError::InvalidCount {
                requested: s.to_string(),
                available: 0,
            })
    }
}

impl fmt::Display for EnrichCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichCount::All => write!(f, "all"),
            EnrichCount::Limit(n) => write!(f, "{n}"),
        }
    }
}

impl EnrichCount {
    fn resolve(self, available: usize) -> Result<usize> {
        match self {
            EnrichCount::All => Ok(available),
            EnrichCount::Limit(n) if n > 0 && n <= available => Ok(n),
            EnrichCount::Limit(n) => Err(ScrapeError::InvalidCount {
                requested: n.to_string(),
                available,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichOutcome {
    pub path: PathBuf,
    pub requested: usize,
    pub processed: usize,
    pub failed: usize,
    pub stopped: bool,
    #[serde(skip)]
    pub records: Vec<ListingRecord>,
}

/// Write `detail` over the first record whose link equals the detail page
/// URL. Fields the detail page lacks become absent and are saved as their
/// sentinels. Returns whether a record matched.
pub fn merge_detail(records: &mut [ListingRecord], detail: &DetailPage) -> bool {
    let Some(record) = records
        .iter_mut()
        .find(|r| r.link.as_deref() == Some(detail.url.as_str()))
    else {
        return false;
    };
    record.title = detail.title.clone();
    record.price_raw = detail.price.clone();
    record.location = detail.location.clone();
    record.detail = Some(DetailFields {
        description: detail.description.clone(),
        date_posted_raw: detail.date_posted.clone(),
        seller_username: detail.seller_username.clone(),
    });
    true
}

pub struct DetailMerger<'a> {
    config: &'a Config,
    source: &'a dyn PageSource,
    sink: &'a dyn DiagnosticsSink,
    stop: CancellationToken,
}

impl<'a> DetailMerger<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn PageSource,
        sink: &'a dyn DiagnosticsSink,
        stop: CancellationToken,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            stop,
        }
    }

    /// Enrich up to `count` linked records of the file at `path` and
    /// rewrite it in place, processed and unprocessed records alike.
    pub async fn run(&self, path: impl Into<PathBuf>, count: EnrichCount) -> Result<EnrichOutcome> {
        let path = path.into();
        let mut records = load_records(&path)?;

        let links: Vec<String> = records.iter().filter_map(|r| r.link.clone()).collect();
        let requested = count.resolve(links.len())?;
        let extractor = DetailExtractor::new(&self.config.detail);

        let mut processed = 0;
        let mut failed = 0;
        let mut stopped = false;

        for (idx, link) in links.iter().take(requested).enumerate() {
            if self.stop.is_cancelled() {
                tracing::info!("stopping scraping as requested");
                stopped = true;
                break;
            }
            if idx > 0 {
                self.pause().await;
                if self.stop.is_cancelled() {
                    stopped = true;
                    break;
                }
            }

            tracing::info!(%link, "scraping product page");
            match self.source.navigate(link).await {
                Ok(page) => {
                    let mut detail = extractor.extract(&page, self.sink);
                    // Merge on the stored link, not on wherever a redirect ended up.
                    detail.url = link.clone();
                    let matched = merge_detail(&mut records, &detail);
                    self.sink.record(Diagnostic::DetailMerged {
                        link: link.clone(),
                        matched,
                    });
                    processed += 1;
                }
                Err(e) => {
                    self.sink.record(Diagnostic::NavigationFailed {
                        url: link.clone(),
                        reason: e.to_string(),
                    });
                    failed += 1;
                }
            }
        }

        write_records(&path, &records)?;
        self.sink.record(Diagnostic::EnrichEnded {
            processed,
            failed,
            stopped,
        });
        self.sink.record(Diagnostic::Persisted {
            path: path.display().to_string(),
        });

        Ok(EnrichOutcome {
            path,
            requested,
            processed,
            failed,
            stopped,
            records,
        })
    }

    async fn pause(&self) {
        let delay = self.config.detail_delay;
        if delay.is_zero() {
            return;
        }
        self.sink.record(Diagnostic::Sleeping {
            seconds: delay.as_secs_f64(),
        });
        tokio::select! {
            _ = sleep(delay) => {}
            _ = self.stop.cancelled() => {}
        }
    }
}
