//! Diagnostic events emitted by the sweep and enrich loops.
//!
//! The core never logs through a global; it hands every event to a
//! [`DiagnosticsSink`]. The binary uses [`TracingSink`] (or [`ChannelSink`]
//! for streaming), tests use [`CollectingSink`].

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Diagnostic {
    SweepStarted {
        search_term: String,
        planned_urls: usize,
    },
    PageFetching {
        url: String,
        page_index: usize,
    },
    PageExtracted {
        url: String,
        page_index: usize,
        records: usize,
    },
    FieldFailed {
        url: String,
        item_number: Option<u64>,
        field: &'static str,
        reason: String,
    },
    NavigationFailed {
        url: String,
        reason: String,
    },
    PriceUnparseable {
        item_number: u64,
        raw: String,
        reason: String,
    },
    Sleeping {
        seconds: f64,
    },
    SweepEnded {
        reason: String,
        pages_visited: usize,
        records: usize,
    },
    DetailMerged {
        link: String,
        matched: bool,
    },
    EnrichEnded {
        processed: usize,
        failed: usize,
        stopped: bool,
    },
    Persisted {
        path: String,
    },
}

pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: Diagnostic);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: Diagnostic) {
        match &event {
            Diagnostic::FieldFailed {
                url,
                item_number,
                field,
                reason,
            } => tracing::warn!(%url, ?item_number, field, %reason, "field extraction failed"),
            Diagnostic::NavigationFailed { url, reason } => {
                tracing::error!(%url, %reason, "failed to fetch page")
            }
            Diagnostic::PriceUnparseable {
                item_number,
                raw,
                reason,
            } => tracing::error!(item_number, %raw, %reason, "error converting price"),
            Diagnostic::Sleeping { seconds } => {
                tracing::debug!("sleeping for {seconds:.2} seconds")
            }
            Diagnostic::PageFetching { url, page_index } => {
                tracing::info!(%url, page_index, "scraping url")
            }
            Diagnostic::PageExtracted {
                url,
                page_index,
                records,
            } => tracing::info!(%url, page_index, records, "page scraped"),
            Diagnostic::SweepStarted {
                search_term,
                planned_urls,
            } => tracing::info!(%search_term, planned_urls, "sweep started"),
            Diagnostic::SweepEnded {
                reason,
                pages_visited,
                records,
            } => tracing::info!(%reason, pages_visited, records, "sweep ended"),
            Diagnostic::DetailMerged { link, matched } => {
                tracing::info!(%link, matched, "detail page merged")
            }
            Diagnostic::EnrichEnded {
                processed,
                failed,
                stopped,
            } => tracing::info!(processed, failed, stopped, "enrich ended"),
            Diagnostic::Persisted { path } => tracing::info!(%path, "saved"),
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticsSink for CollectingSink {
    fn record(&self, event: Diagnostic) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Logs through `tracing` and also pushes each event into a channel.
/// A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Diagnostic>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Diagnostic>) -> Self {
        Self { tx }
    }
}

impl DiagnosticsSink for ChannelSink {
    fn record(&self, event: Diagnostic) {
        TracingSink.record(event.clone());
        let _ = self.tx.send(event);
    }
}
