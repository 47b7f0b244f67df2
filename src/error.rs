use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a sweep or an enrich run before it can do useful work,
/// or that surface from persistence.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("malformed url {url}: {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("no page urls could be generated (requested {requested} pages)")]
    NoPages { requested: usize },

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("requested {requested} records but only {available} carry a link")]
    InvalidCount { requested: String, available: usize },

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A page could not be fetched.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("robots.txt disallows {0}")]
    RobotsDisallowed(String),

    #[error("{url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },
}

/// A single field could not be extracted. Always recovered where it happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("no element matches `{0}`")]
    Missing(String),

    #[error("element matching `{0}` has no text")]
    EmptyText(String),

    #[error("element matching `{selector}` has no `{attribute}` attribute")]
    MissingAttribute { selector: String, attribute: String },

    #[error("selector `{0}` could not be parsed")]
    InvalidSelector(String),

    #[error("link `{href}` cannot be resolved: {reason}")]
    BadLink { href: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("price `{raw}` is not a number after normalization (`{normalized}`)")]
pub struct PriceParseError {
    pub raw: String,
    pub normalized: String,
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
