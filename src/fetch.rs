use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use rand::{Rng, rng};
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, DNT, HeaderMap, HeaderName, HeaderValue,
    PRAGMA, REFERER, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use robotstxt::DefaultMatcher;
use scraper::Html;
use url::Url;

use crate::{config::Config, error::NavigationError};

/// A fetched document.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

impl Page {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Turns a URL into a queryable document.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<Page, NavigationError>;
}

// -------------------------
// HTTP implementation
// -------------------------

pub struct HttpFetcher {
    client: reqwest::Client,
    respect_robots: bool,
    robots: Mutex<HashMap<String, String>>,
    last_url: Mutex<Option<String>>,
    origin: String,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, NavigationError> {
        let client = reqwest::Client::builder()
            .user_agent(random_desktop_ua())
            .redirect(reqwest::redirect::Policy::limited(8))
            .timeout(config.fetch_timeout)
            .cookie_store(true)
            .build()
            .map_err(|source| NavigationError::Request {
                url: config.site.origin.clone(),
                source,
            })?;
        Ok(Self {
            client,
            respect_robots: config.respect_robots,
            robots: Mutex::new(HashMap::new()),
            last_url: Mutex::new(None),
            origin: config.site.origin.clone(),
        })
    }

    async fn allowed_by_robots(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let origin = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        let cached = self
            .robots
            .lock()
            .ok()
            .and_then(|map| map.get(&origin).cloned());
        let robots_txt = match cached {
            Some(txt) => txt,
            None => {
                let robots_url = format!("{origin}/robots.txt");
                let txt = match self.client.get(&robots_url).send().await {
                    Ok(rsp) if rsp.status().is_success() => rsp.text().await.unwrap_or_default(),
                    _ => String::new(),
                };
                if let Ok(mut map) = self.robots.lock() {
                    map.insert(origin, txt.clone());
                }
                txt
            }
        };

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&robots_txt, "Mozilla", url.as_str())
    }

    fn referer(&self) -> String {
        self.last_url
            .lock()
            .ok()
            .and_then(|last| last.clone())
            .unwrap_or_else(|| self.origin.clone())
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn navigate(&self, url: &str) -> Result<Page, NavigationError> {
        let parsed = Url::parse(url).map_err(|e| NavigationError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if self.respect_robots && !self.allowed_by_robots(&parsed).await {
            return Err(NavigationError::RobotsDisallowed(url.to_string()));
        }

        let referer = self.referer();
        let rsp = self
            .client
            .get(parsed.as_str())
            .headers(base_headers(&referer))
            .send()
            .await
            .map_err(|source| NavigationError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = rsp.status();
        let final_url = rsp.url().to_string();
        if !status.is_success() {
            return Err(NavigationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let html = rsp.text().await.map_err(|source| NavigationError::Request {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!(%url, %final_url, len = html.len(), %referer, "fetched");

        if let Ok(mut last) = self.last_url.lock() {
            *last = Some(url.to_string());
        }
        Ok(Page::new(url, html))
    }
}

fn base_headers(referer: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&random_desktop_ua()) {
        h.insert(USER_AGENT, ua);
    }
    h.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    h.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    if let Ok(r) = HeaderValue::from_str(referer) {
        h.insert(REFERER, r);
    }
    h.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    h.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    h.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    h.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    h.insert(DNT, HeaderValue::from_static("1"));
    h.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    h.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    h.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    h
}

fn random_desktop_ua() -> String {
    const UAS: &[&str] = &[
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    ];
    let i = rng().random_range(0..UAS.len());
    UAS[i].to_string()
}

/// Uniformly sampled politeness delay in `[min, max]` seconds.
pub fn jitter(min_secs: f64, max_secs: f64) -> Duration {
    if max_secs <= min_secs {
        return Duration::from_secs_f64(min_secs.max(0.0));
    }
    Duration::from_secs_f64(rng().random_range(min_secs..=max_secs))
}
