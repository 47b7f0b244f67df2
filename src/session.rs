// -------------------------
// Listing sweep
// -------------------------

use std::{fmt, path::PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{Config, FetchFailurePolicy},
    diagnostics::{Diagnostic, DiagnosticsSink},
    error::{Result, ScrapeError},
    extract::ListingExtractor,
    fetch::{PageSource, jitter},
    pager::{PagePlan, plan_pages},
    record::ListingRecord,
    stats::{PriceStatsSummary, summarize},
    store::{FileStore, SavedSweep},
};

/// Why a sweep stopped. Every variant is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EndReason {
    /// The stop signal was observed at a URL boundary.
    Stopped,
    /// A page yielded no listings.
    Exhausted { url: String },
    /// A page could not be fetched.
    Errored { url: String, error: String },
    /// Every planned URL was processed.
    Completed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Stopped => write!(f, "Stopped"),
            EndReason::Exhausted { .. } => write!(f, "Exhausted"),
            EndReason::Errored { .. } => write!(f, "Errored"),
            EndReason::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub urls_visited: Vec<String>,
    pub records: Vec<ListingRecord>,
    pub next_item_number: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            next_item_number: 1,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub reason: EndReason,
    pub search_term: String,
    pub pages_visited: usize,
    pub urls_visited: Vec<String>,
    #[serde(skip)]
    pub records: Vec<ListingRecord>,
    pub record_count: usize,
    pub summary: PriceStatsSummary,
    pub files: SavedSweep,
    pub url_plan: PathBuf,
}

pub struct ScrapeSession<'a> {
    config: &'a Config,
    source: &'a dyn PageSource,
    sink: &'a dyn DiagnosticsSink,
    store: FileStore,
    stop: CancellationToken,
}

impl<'a> ScrapeSession<'a> {
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
            store: FileStore::new(config.output_dir.clone()),
            stop,
        }
    }

    /// Sweep `first`, `second` and `pages` generated URLs.
    ///
    /// Fails without writing anything only when the URL plan cannot be built.
    /// Once fetching has started, whatever was collected is saved.
    pub async fn run(&self, first: &str, second: &str, pages: usize) -> Result<SweepOutcome> {
        let plan = plan_pages(first, second, pages, &self.config.site)?;
        if plan.generated.is_empty() {
            return Err(ScrapeError::NoPages { requested: pages });
        }
        let extractor = ListingExtractor::new(self.config)?;

        let started_at = OffsetDateTime::now_utc().to_offset(self.config.utc_offset);
        let stem = FileStore::session_stem(&plan.spec.search_term, started_at);
        let urls = plan.all_urls();
        let url_plan = self.store.save_url_plan(&stem, &urls)?;

        self.sink.record(Diagnostic::SweepStarted {
            search_term: plan.spec.search_term.clone(),
            planned_urls: urls.len(),
        });

        let (state, reason) = self.sweep(&plan, &urls, &extractor).await;

        let summary = summarize(&state.records, &self.config.site, self.sink);
        let files = self
            .store
            .save_sweep(&stem, state.urls_visited.len(), &state.records, &summary)?;

        self.sink.record(Diagnostic::SweepEnded {
            reason: reason.to_string(),
            pages_visited: state.urls_visited.len(),
            records: state.records.len(),
        });
        for path in [&files.records, &files.info] {
            self.sink.record(Diagnostic::Persisted {
                path: path.display().to_string(),
            });
        }

        Ok(SweepOutcome {
            reason,
            search_term: plan.spec.search_term,
            pages_visited: state.urls_visited.len(),
            urls_visited: state.urls_visited,
            record_count: state.records.len(),
            records: state.records,
            summary,
            files,
            url_plan,
        })
    }

    async fn sweep(
        &self,
        plan: &PagePlan,
        urls: &[String],
        extractor: &ListingExtractor,
    ) -> (SessionState, EndReason) {
        let mut state = SessionState::new();
        tracing::debug!(start_page = plan.start_page, next_page = plan.next_page, "page plan");

        for (idx, url) in urls.iter().enumerate() {
            if self.stop.is_cancelled() {
                tracing::info!("stopping scraping as requested");
                return (state, EndReason::Stopped);
            }

            let page_index = idx + 1;
            self.sink.record(Diagnostic::PageFetching {
                url: url.clone(),
                page_index,
            });
            state.urls_visited.push(url.clone());

            let page = match self.source.navigate(url).await {
                Ok(page) => page,
                Err(e) => {
                    self.sink.record(Diagnostic::NavigationFailed {
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                    match self.config.on_fetch_error {
                        FetchFailurePolicy::EndSweep => {
                            return (
                                state,
                                EndReason::Errored {
                                    url: url.clone(),
                                    error: e.to_string(),
                                },
                            );
                        }
                        FetchFailurePolicy::SkipPage => continue,
                    }
                }
            };

            let (records, next) = extractor.extract(&page, state.next_item_number, self.sink);
            if records.is_empty() {
                tracing::info!(%url, "no data found, ending sweep");
                return (state, EndReason::Exhausted { url: url.clone() });
            }

            self.sink.record(Diagnostic::PageExtracted {
                url: url.clone(),
                page_index,
                records: records.len(),
            });
            state.records.extend(records);
            state.next_item_number = next;

            if page_index < urls.len() {
                self.pause().await;
            }
        }

        (state, EndReason::Completed)
    }

    async fn pause(&self) {
        let delay = jitter(self.config.delay_min_secs, self.config.delay_max_secs);
        self.sink.record(Diagnostic::Sleeping {
            seconds: delay.as_secs_f64(),
        });
        // A stop request cuts the wait short; it is acted on at the next URL.
        tokio::select! {
            _ = sleep(delay) => {}
            _ = self.stop.cancelled() => {}
        }
    }
}
