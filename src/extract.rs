// -------------------------
// Parsing helpers
// -------------------------
//
// Each field is looked up on its own. A missing element or unusable selector
// only costs that one field; the record is still emitted.

use scraper::{ElementRef, Selector};
use url::Url;

use crate::{
    config::{Config, DetailSelectors, ListingSelectors},
    diagnostics::{Diagnostic, DiagnosticsSink},
    error::{FieldError, Result, ScrapeError},
    fetch::Page,
    record::ListingRecord,
};

#[derive(Debug, Clone)]
struct FieldSelector {
    source: String,
    parsed: Option<Selector>,
}

impl FieldSelector {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            parsed: Selector::parse(source).ok(),
        }
    }

    fn find<'a>(&self, scope: ElementRef<'a>) -> std::result::Result<ElementRef<'a>, FieldError> {
        let sel = self
            .parsed
            .as_ref()
            .ok_or_else(|| FieldError::InvalidSelector(self.source.clone()))?;
        scope
            .select(sel)
            .next()
            .ok_or_else(|| FieldError::Missing(self.source.clone()))
    }

    fn text(&self, scope: ElementRef<'_>) -> std::result::Result<String, FieldError> {
        let text = element_text(self.find(scope)?);
        if text.is_empty() {
            return Err(FieldError::EmptyText(self.source.clone()));
        }
        Ok(text)
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_link(origin: &Url, href: &str) -> std::result::Result<String, FieldError> {
    origin
        .join(href.trim())
        .map(|u| u.to_string())
        .map_err(|e| FieldError::BadLink {
            href: href.to_string(),
            reason: e.to_string(),
        })
}

/// Takes the value or records the failure and yields `None`.
fn keep<T>(
    value: std::result::Result<T, FieldError>,
    sink: &dyn DiagnosticsSink,
    url: &str,
    item_number: Option<u64>,
    field: &'static str,
) -> Option<T> {
    match value {
        Ok(v) => Some(v),
        Err(e) => {
            sink.record(Diagnostic::FieldFailed {
                url: url.to_string(),
                item_number,
                field,
                reason: e.to_string(),
            });
            None
        }
    }
}

// -------------------------
// Listing pages
// -------------------------

pub struct ListingExtractor {
    origin: Url,
    container: Selector,
    title_link: FieldSelector,
    price: FieldSelector,
    location: FieldSelector,
    date_created: FieldSelector,
}

impl ListingExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_selectors(&config.site.origin, &config.listing)
    }

    pub fn with_selectors(origin: &str, sel: &ListingSelectors) -> Result<Self> {
        let origin = Url::parse(origin).map_err(|e| ScrapeError::MalformedUrl {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;
        let container = Selector::parse(&sel.container).map_err(|e| ScrapeError::Selector {
            selector: sel.container.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            origin,
            container,
            title_link: FieldSelector::new(&sel.title_link),
            price: FieldSelector::new(&sel.price),
            location: FieldSelector::new(&sel.location),
            date_created: FieldSelector::new(&sel.date_created),
        })
    }

    /// Extract every listing on `page` in document order, numbering them
    /// from `next_item_number`. Returns the records and the next free number.
    pub fn extract(
        &self,
        page: &Page,
        mut next_item_number: u64,
        sink: &dyn DiagnosticsSink,
    ) -> (Vec<ListingRecord>, u64) {
        let doc = page.document();
        let mut records = Vec::new();

        for item in doc.select(&self.container) {
            let n = next_item_number;
            let mut record = ListingRecord::new(n);

            match self.title_link.find(item) {
                Ok(anchor) => {
                    let title = element_text(anchor);
                    record.title = keep(
                        if title.is_empty() {
                            Err(FieldError::EmptyText(self.title_link.source.clone()))
                        } else {
                            Ok(title)
                        },
                        sink,
                        &page.url,
                        Some(n),
                        "title",
                    );
                    let link = anchor
                        .value()
                        .attr("href")
                        .filter(|h| !h.trim().is_empty())
                        .ok_or_else(|| FieldError::MissingAttribute {
                            selector: self.title_link.source.clone(),
                            attribute: "href".to_string(),
                        })
                        .and_then(|href| resolve_link(&self.origin, href));
                    record.link = keep(link, sink, &page.url, Some(n), "link");
                }
                Err(e) => {
                    keep::<String>(Err(e.clone()), sink, &page.url, Some(n), "title");
                    keep::<String>(Err(e), sink, &page.url, Some(n), "link");
                }
            }

            record.price_raw = keep(self.price.text(item), sink, &page.url, Some(n), "price");
            record.location = keep(self.location.text(item), sink, &page.url, Some(n), "location");
            record.date_created_raw = keep(
                self.date_created.text(item),
                sink,
                &page.url,
                Some(n),
                "date_created",
            );

            records.push(record);
            next_item_number += 1;
        }

        (records, next_item_number)
    }
}

// -------------------------
// Detail pages
// -------------------------

/// Fields scraped from one listing's own page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub url: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date_posted: Option<String>,
    pub seller_username: Option<String>,
}

pub struct DetailExtractor {
    title: FieldSelector,
    price: FieldSelector,
    description: FieldSelector,
    location: FieldSelector,
    date_posted: FieldSelector,
    seller_username: FieldSelector,
}

impl DetailExtractor {
    pub fn new(sel: &DetailSelectors) -> Self {
        Self {
            title: FieldSelector::new(&sel.title),
            price: FieldSelector::new(&sel.price),
            description: FieldSelector::new(&sel.description),
            location: FieldSelector::new(&sel.location),
            date_posted: FieldSelector::new(&sel.date_posted),
            seller_username: FieldSelector::new(&sel.seller_username),
        }
    }

    pub fn extract(&self, page: &Page, sink: &dyn DiagnosticsSink) -> DetailPage {
        let doc = page.document();
        let root = doc.root_element();
        let url = page.url.as_str();

        let detail = DetailPage {
            url: page.url.clone(),
            title: keep(self.title.text(root), sink, url, None, "title"),
            price: keep(self.price.text(root), sink, url, None, "price"),
            description: keep(self.description.text(root), sink, url, None, "description"),
            location: keep(self.location.text(root), sink, url, None, "location"),
            date_posted: keep(self.date_posted.text(root), sink, url, None, "date_posted"),
            seller_username: keep(
                self.seller_username.text(root),
                sink,
                url,
                None,
                "seller_username",
            ),
        };
        tracing::debug!(?detail, "detail page extracted");
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    const LISTING: &str = r#"
    <html><body><ul>
      <li><article class="aditem">
        <div class="aditem-main--top--left"> 10115 Mitte </div>
        <div class="aditem-main--top--right">Heute, 10:15</div>
        <div class="text-module-begin"><a href="/s-anzeige/rennrad/111">Rennrad  28 Zoll</a></div>
        <p class="aditem-main--middle--price-shipping--price">250 € VB</p>
      </article></li>
      <li><article class="aditem">
        <div class="aditem-main--top--left">80331 Altstadt</div>
        <div class="aditem-main--top--right">Gestern, 18:02</div>
        <div class="text-module-begin"><a href="https://www.kleinanzeigen.de/s-anzeige/lampe/222">Lampe</a></div>
      </article></li>
      <li><article class="aditem">
        <div class="aditem-main--top--left">50667 Köln</div>
        <div class="aditem-main--top--right">12.05.2024</div>
        <div class="text-module-begin"><a href="/s-anzeige/tisch/333">Tisch</a></div>
        <p class="aditem-main--middle--price-shipping--price">40 €</p>
      </article></li>
    </ul></body></html>"#;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(&Config::default()).unwrap()
    }

    #[test]
    fn extracts_in_document_order_and_numbers_records() {
        let sink = CollectingSink::new();
        let page = Page::new("https://www.kleinanzeigen.de/s-x", LISTING);
        let (records, next) = extractor().extract(&page, 5, &sink);

        assert_eq!(next, 8);
        let numbers: Vec<u64> = records.iter().map(|r| r.item_number).collect();
        assert_eq!(numbers, vec![5, 6, 7]);

        let first = &records[0];
        assert_eq!(first.title.as_deref(), Some("Rennrad 28 Zoll"));
        assert_eq!(
            first.link.as_deref(),
            Some("https://www.kleinanzeigen.de/s-anzeige/rennrad/111")
        );
        assert_eq!(first.price_raw.as_deref(), Some("250 € VB"));
        assert_eq!(first.location.as_deref(), Some("10115 Mitte"));
        assert_eq!(first.date_created_raw.as_deref(), Some("Heute, 10:15"));
    }

    #[test]
    fn missing_price_only_costs_the_price() {
        let sink = CollectingSink::new();
        let page = Page::new("https://www.kleinanzeigen.de/s-x", LISTING);
        let (records, _) = extractor().extract(&page, 1, &sink);

        let lamp = &records[1];
        assert_eq!(lamp.price_raw, None);
        assert_eq!(lamp.title.as_deref(), Some("Lampe"));
        assert_eq!(
            lamp.link.as_deref(),
            Some("https://www.kleinanzeigen.de/s-anzeige/lampe/222")
        );
        assert_eq!(lamp.location.as_deref(), Some("80331 Altstadt"));
        assert_eq!(lamp.date_created_raw.as_deref(), Some("Gestern, 18:02"));

        let value = serde_json::to_value(lamp).unwrap();
        assert_eq!(value["price"], "No Price");

        // the listing after the degraded one is untouched
        assert_eq!(records[2].price_raw.as_deref(), Some("40 €"));

        let failures: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Diagnostic::FieldFailed {
                    item_number, field, ..
                } => Some((item_number, field)),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![(Some(2), "price")]);
    }

    #[test]
    fn broken_field_selector_does_not_stop_other_fields() {
        let sel = ListingSelectors {
            location: "div[[".to_string(),
            ..ListingSelectors::default()
        };
        let ex = ListingExtractor::with_selectors("https://www.kleinanzeigen.de", &sel).unwrap();
        let sink = CollectingSink::new();
        let page = Page::new("https://www.kleinanzeigen.de/s-x", LISTING);
        let (records, _) = ex.extract(&page, 1, &sink);

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.location.is_none()));
        assert!(records.iter().all(|r| r.title.is_some()));
    }

    #[test]
    fn broken_container_selector_is_rejected() {
        let sel = ListingSelectors {
            container: "..".to_string(),
            ..ListingSelectors::default()
        };
        let err = ListingExtractor::with_selectors("https://www.kleinanzeigen.de", &sel)
            .err()
            .unwrap();
        assert!(matches!(err, ScrapeError::Selector { .. }));
    }

    #[test]
    fn page_without_containers_yields_nothing() {
        let sink = CollectingSink::new();
        let page = Page::new("https://www.kleinanzeigen.de/s-x", "<html><body></body></html>");
        let (records, next) = extractor().extract(&page, 4, &sink);
        assert!(records.is_empty());
        assert_eq!(next, 4);
    }

    #[test]
    fn detail_fields_fall_back_independently() {
        let html = r#"<html><body>
            <h1>Rennrad 28 Zoll</h1>
            <span class="price">230 €</span>
            <div id="viewad-description"> Kaum gefahren.
               Abholung in Berlin. </div>
            <span id="viewad-locality">10115 Berlin - Mitte</span>
        </body></html>"#;
        let sink = CollectingSink::new();
        let page = Page::new("https://www.kleinanzeigen.de/s-anzeige/rennrad/111", html);
        let detail = DetailExtractor::new(&DetailSelectors::default()).extract(&page, &sink);

        assert_eq!(detail.title.as_deref(), Some("Rennrad 28 Zoll"));
        assert_eq!(detail.price.as_deref(), Some("230 €"));
        assert_eq!(
            detail.description.as_deref(),
            Some("Kaum gefahren. Abholung in Berlin.")
        );
        assert_eq!(detail.date_posted, None);
        assert_eq!(detail.seller_username, None);
        assert_eq!(sink.events().len(), 2);
    }
}
