use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use time::UtcOffset;

// -------------------------
// Site profile
// -------------------------

/// Markers that describe the target site's URL and price conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Scheme and host, used to absolutize relative listing links.
    pub origin: String,
    /// Path marker that precedes the search term, e.g. `/s-`.
    pub search_marker: String,
    /// Path segment prefix that carries the page number, e.g. `seite:`.
    pub page_marker: String,
    pub currency_marker: String,
    pub negotiable_marker: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            origin: "https://www.kleinanzeigen.de".to_string(),
            search_marker: "/s-".to_string(),
            page_marker: "seite:".to_string(),
            currency_marker: "€".to_string(),
            negotiable_marker: "VB".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    pub container: String,
    pub title_link: String,
    pub price: String,
    pub location: String,
    pub date_created: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            container: ".aditem".to_string(),
            title_link: ".text-module-begin a".to_string(),
            price: ".aditem-main--middle--price-shipping--price".to_string(),
            location: ".aditem-main--top--left".to_string(),
            date_created: ".aditem-main--top--right".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailSelectors {
    pub title: String,
    pub price: String,
    pub description: String,
    pub location: String,
    pub date_posted: String,
    pub seller_username: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            title: "h1".to_string(),
            price: "span.price".to_string(),
            description: "div#viewad-description".to_string(),
            location: "span#viewad-locality".to_string(),
            date_posted: "span#viewad-extra-info".to_string(),
            seller_username: ".text-body-regular-strong.text-force-linebreak.userprofile-vip a"
                .to_string(),
        }
    }
}

/// What a listing sweep does when a page cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Stop the sweep and persist what was collected so far.
    EndSweep,
    /// Log the failure and continue with the next URL.
    SkipPage,
}

impl std::str::FromStr for FetchFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "end" | "end_sweep" => Ok(Self::EndSweep),
            "skip" | "skip_page" => Ok(Self::SkipPage),
            other => bail!("unknown fetch failure policy `{other}` (expected `end` or `skip`)"),
        }
    }
}

// -------------------------
// Config
// -------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub site: SiteProfile,
    pub listing: ListingSelectors,
    pub detail: DetailSelectors,
    pub output_dir: PathBuf,
    /// Politeness delay between listing pages, sampled uniformly in seconds.
    pub delay_min_secs: f64,
    pub delay_max_secs: f64,
    pub detail_delay: Duration,
    pub fetch_timeout: Duration,
    pub on_fetch_error: FetchFailurePolicy,
    pub respect_robots: bool,
    /// Offset for file name timestamps. Read once at startup; the local
    /// offset cannot be queried once worker threads exist.
    pub utc_offset: UtcOffset,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteProfile::default(),
            listing: ListingSelectors::default(),
            detail: DetailSelectors::default(),
            output_dir: PathBuf::from("."),
            delay_min_secs: 2.0,
            delay_max_secs: 5.0,
            detail_delay: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(25),
            on_fetch_error: FetchFailurePolicy::EndSweep,
            respect_robots: true,
            utc_offset: UtcOffset::UTC,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut cfg = Self {
            utc_offset: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
            ..Self::default()
        };
        if let Ok(origin) = env::var("ADSWEEP_ORIGIN") {
            cfg.site.origin = origin.trim_end_matches('/').to_string();
        }
        if let Ok(dir) = env::var("ADSWEEP_OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_var::<f64>("ADSWEEP_DELAY_MIN_SECS")? {
            cfg.delay_min_secs = v;
        }
        if let Some(v) = parse_var::<f64>("ADSWEEP_DELAY_MAX_SECS")? {
            cfg.delay_max_secs = v;
        }
        if let Some(v) = parse_var::<f64>("ADSWEEP_DETAIL_DELAY_SECS")? {
            cfg.detail_delay = secs(v).context("ADSWEEP_DETAIL_DELAY_SECS")?;
        }
        if let Some(v) = parse_var::<f64>("ADSWEEP_FETCH_TIMEOUT_SECS")? {
            cfg.fetch_timeout = secs(v).context("ADSWEEP_FETCH_TIMEOUT_SECS")?;
        }
        if let Some(v) = parse_var::<FetchFailurePolicy>("ADSWEEP_ON_FETCH_ERROR")? {
            cfg.on_fetch_error = v;
        }
        if let Some(v) = parse_var::<bool>("ADSWEEP_RESPECT_ROBOTS")? {
            cfg.respect_robots = v;
        }
        if let Ok(host) = env::var("HOST") {
            cfg.host = host;
        }
        if let Some(v) = parse_var::<u16>("PORT")? {
            cfg.port = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.delay_min_secs >= 0.0 && self.delay_min_secs <= self.delay_max_secs) {
            bail!(
                "delay range {}..{} must be non-negative and ordered",
                self.delay_min_secs,
                self.delay_max_secs
            );
        }
        url::Url::parse(&self.site.origin).context("site origin must be an absolute url")?;
        Ok(())
    }

    /// Config with zero delays and robots checks off; handy for fixtures.
    pub fn without_delays(mut self) -> Self {
        self.delay_min_secs = 0.0;
        self.delay_max_secs = 0.0;
        self.detail_delay = Duration::ZERO;
        self.respect_robots = false;
        self
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{name} is invalid: {e}")),
        Err(_) => Ok(None),
    }
}

fn secs(v: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(v).map_err(|e| anyhow::anyhow!("{v} is not a valid duration: {e}"))
}
