//! Two-phase listing scraper for paginated classifieds search results.
//!
//! A sweep ([`session::ScrapeSession`]) walks the result pages of one search
//! and stores a record per listing; enrichment ([`merge::DetailMerger`])
//! later revisits each record's link and merges the detail page into it.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod merge;
pub mod pager;
pub mod record;
pub mod session;
pub mod stats;
pub mod store;

pub use config::{Config, FetchFailurePolicy};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink, TracingSink};
pub use error::{FieldError, NavigationError, PriceParseError, ScrapeError};
pub use fetch::{HttpFetcher, Page, PageSource};
pub use merge::{DetailMerger, EnrichCount, EnrichOutcome};
pub use record::{DetailFields, ListingRecord};
pub use session::{EndReason, ScrapeSession, SweepOutcome};
pub use stats::PriceStatsSummary;
