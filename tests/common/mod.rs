#![allow(dead_code)]

use std::{collections::HashMap, sync::Mutex};

use adsweep::{NavigationError, Page, PageSource};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub const ORIGIN: &str = "https://www.kleinanzeigen.de";

/// Serves canned HTML by URL; unknown URLs fail to navigate.
#[derive(Default)]
pub struct FixtureSource {
    pages: HashMap<String, String>,
    cancel_on: Option<(String, CancellationToken)>,
    fetched: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    /// Cancel `token` while serving `url`, like a user pressing stop mid-fetch.
    pub fn cancel_when_fetching(mut self, url: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.to_string(), token));
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FixtureSource {
    async fn navigate(&self, url: &str) -> Result<Page, NavigationError> {
        self.fetched.lock().unwrap().push(url.to_string());
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == url {
                token.cancel();
            }
        }
        match self.pages.get(url) {
            Some(html) => Ok(Page::new(url, html.clone())),
            None => Err(NavigationError::Unreachable {
                url: url.to_string(),
                reason: "no fixture".to_string(),
            }),
        }
    }
}

/// A result page with one listing per `(slug, price)`.
pub fn listing_page(items: &[(&str, &str)]) -> String {
    let mut body = String::from("<html><body><ul id=\"srchrslt-adtable\">");
    for (slug, price) in items {
        body.push_str(&format!(
            r#"<li><article class="aditem">
                 <div class="aditem-main--top--left">10115 Mitte</div>
                 <div class="aditem-main--top--right">Heute, 10:15</div>
                 <div class="text-module-begin"><a href="/s-anzeige/{slug}">{slug}</a></div>
                 <p class="aditem-main--middle--price-shipping--price">{price}</p>
               </article></li>"#
        ));
    }
    body.push_str("</ul></body></html>");
    body
}

pub fn detail_page(title: &str, description: &str, seller: &str) -> String {
    format!(
        r#"<html><body>
             <h1>{title}</h1>
             <span class="price">99 €</span>
             <div id="viewad-description">{description}</div>
             <span id="viewad-locality">10115 Berlin - Mitte</span>
             <span id="viewad-extra-info">12.05.2024</span>
             <span class="text-body-regular-strong text-force-linebreak userprofile-vip"><a href="/s-bestandsliste.html">{seller}</a></span>
           </body></html>"#
    )
}

pub fn link(slug: &str) -> String {
    format!("{ORIGIN}/s-anzeige/{slug}")
}
