// -------------------------
// Pager helpers (`seite:N` path-segment scheme)
// -------------------------

use serde::Serialize;

use crate::{
    config::SiteProfile,
    error::{Result, ScrapeError},
};

/// A search URL broken into the parts needed to rebuild it for any page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlSpec {
    /// Everything up to and including the search marker.
    pub base_url: String,
    pub search_term: String,
    pub search_modifiers: Vec<String>,
    pub page_number: u32,
}

impl UrlSpec {
    pub fn parse(url: &str, site: &SiteProfile) -> Result<Self> {
        let Some((head, tail)) = url.split_once(site.search_marker.as_str()) else {
            return Err(ScrapeError::MalformedUrl {
                url: url.to_string(),
                reason: format!("missing search marker `{}`", site.search_marker),
            });
        };

        // A page segment may sit in front of the term; it is not part of the search.
        let mut parts = tail
            .split('/')
            .filter(|s| !s.is_empty() && !s.contains(site.page_marker.as_str()))
            .map(str::to_string);
        let search_term = parts.next().ok_or_else(|| ScrapeError::MalformedUrl {
            url: url.to_string(),
            reason: "no search term after the search marker".to_string(),
        })?;

        Ok(Self {
            base_url: format!("{head}{}", site.search_marker),
            search_term,
            search_modifiers: parts.collect(),
            page_number: page_number(url, site)?,
        })
    }

    pub fn page_url(&self, page: u32, site: &SiteProfile) -> String {
        let mut url = format!(
            "{}{}{}/{}",
            self.base_url, site.page_marker, page, self.search_term
        );
        if !self.search_modifiers.is_empty() {
            url.push('/');
            url.push_str(&self.search_modifiers.join("/"));
        }
        url
    }
}

/// Page number carried by `url`, 1 when there is no page segment.
pub fn page_number(url: &str, site: &SiteProfile) -> Result<u32> {
    // The segment may carry a prefix, e.g. `s-seite:3` right after the search marker.
    let Some((segment, raw)) = url.split('/').find_map(|part| {
        part.split_once(site.page_marker.as_str())
            .map(|(_, raw)| (part, raw))
    }) else {
        return Ok(1);
    };
    match raw.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ScrapeError::MalformedUrl {
            url: url.to_string(),
            reason: format!("page segment `{segment}` has no positive page number"),
        }),
    }
}

/// The two seed URLs plus the pages generated after them.
#[derive(Debug, Clone, Serialize)]
pub struct PagePlan {
    pub spec: UrlSpec,
    /// Effective page of the first seed after reconciliation.
    pub start_page: u32,
    /// Page of the second seed; generation continues after it.
    pub next_page: u32,
    pub first: String,
    pub second: String,
    pub generated: Vec<String>,
}

impl PagePlan {
    /// Seeds followed by the generated URLs, in fetch order.
    pub fn all_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(self.generated.len() + 2);
        urls.push(self.first.clone());
        urls.push(self.second.clone());
        urls.extend(self.generated.iter().cloned());
        urls
    }
}

/// Infer the page pattern from two sample URLs and generate `count` more.
pub fn plan_pages(first: &str, second: &str, count: usize, site: &SiteProfile) -> Result<PagePlan> {
    let spec = UrlSpec::parse(first, site)?;
    let next_page = page_number(second, site)?;

    let mut start_page = spec.page_number;
    if start_page == 1 && next_page > 1 {
        // First seed is the implicit page one of a listing that pages on.
        start_page = next_page - 1;
    }

    let generated = (1..=count as u32)
        .map(|offset| {
            next_page
                .checked_add(offset)
                .map(|page| spec.page_url(page, site))
                .ok_or_else(|| ScrapeError::MalformedUrl {
                    url: second.to_string(),
                    reason: format!("page {next_page} + {offset} is out of range"),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PagePlan {
        spec,
        start_page,
        next_page,
        first: first.to_string(),
        second: second.to_string(),
        generated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteProfile {
        SiteProfile::default()
    }

    #[test]
    fn parses_term_and_modifiers() {
        let spec = UrlSpec::parse(
            "https://www.kleinanzeigen.de/s-fahrrad/anzeige:angebote/k0",
            &site(),
        )
        .unwrap();
        assert_eq!(spec.base_url, "https://www.kleinanzeigen.de/s-");
        assert_eq!(spec.search_term, "fahrrad");
        assert_eq!(spec.search_modifiers, vec!["anzeige:angebote", "k0"]);
        assert_eq!(spec.page_number, 1);
    }

    #[test]
    fn page_segment_is_not_the_search_term() {
        let spec =
            UrlSpec::parse("https://www.kleinanzeigen.de/s-seite:4/fahrrad/k0", &site()).unwrap();
        assert_eq!(spec.search_term, "fahrrad");
        assert_eq!(spec.search_modifiers, vec!["k0"]);
        assert_eq!(spec.page_number, 4);
    }

    #[test]
    fn missing_search_marker_is_malformed() {
        let err = plan_pages(
            "https://www.kleinanzeigen.de/fahrrad",
            "https://www.kleinanzeigen.de/s-seite:2/fahrrad",
            3,
            &site(),
        )
        .unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedUrl { .. }));
    }

    #[test]
    fn implicit_first_page_continues_after_second_seed() {
        let plan = plan_pages(
            "https://www.kleinanzeigen.de/s-fahrrad/k0",
            "https://www.kleinanzeigen.de/s-seite:3/fahrrad/k0",
            2,
            &site(),
        )
        .unwrap();
        assert_eq!(plan.start_page, 2);
        assert_eq!(
            plan.generated,
            vec![
                "https://www.kleinanzeigen.de/s-seite:4/fahrrad/k0",
                "https://www.kleinanzeigen.de/s-seite:5/fahrrad/k0",
            ]
        );
    }

    #[test]
    fn seeds_without_page_markers_start_generating_at_two() {
        let plan = plan_pages(
            "https://www.kleinanzeigen.de/s-lampe",
            "https://www.kleinanzeigen.de/s-lampe",
            3,
            &site(),
        )
        .unwrap();
        assert_eq!(plan.next_page, 1);
        assert_eq!(
            plan.generated,
            vec![
                "https://www.kleinanzeigen.de/s-seite:2/lampe",
                "https://www.kleinanzeigen.de/s-seite:3/lampe",
                "https://www.kleinanzeigen.de/s-seite:4/lampe",
            ]
        );
        assert_eq!(plan.all_urls().len(), 5);
    }

    #[test]
    fn zero_count_generates_nothing() {
        let plan = plan_pages(
            "https://www.kleinanzeigen.de/s-lampe",
            "https://www.kleinanzeigen.de/s-seite:2/lampe",
            0,
            &site(),
        )
        .unwrap();
        assert!(plan.generated.is_empty());
    }

    #[test]
    fn reads_page_number_behind_search_marker() {
        let url = "https://www.kleinanzeigen.de/s-seite:7/lampe/k0";
        assert_eq!(page_number(url, &site()).unwrap(), 7);
        assert_eq!(page_number("https://www.kleinanzeigen.de/s-lampe/k0", &site()).unwrap(), 1);
    }

    #[test]
    fn generated_urls_read_back_their_own_page() {
        let plan = plan_pages(
            "https://www.kleinanzeigen.de/s-lampe",
            "https://www.kleinanzeigen.de/s-seite:2/lampe",
            2,
            &site(),
        )
        .unwrap();
        let pages: Vec<u32> = plan
            .generated
            .iter()
            .map(|u| page_number(u, &site()).unwrap())
            .collect();
        assert_eq!(pages, vec![3, 4]);
    }

    #[test]
    fn page_past_u32_range_is_malformed() {
        let err = plan_pages(
            "https://www.kleinanzeigen.de/s-lampe",
            "https://www.kleinanzeigen.de/s-seite:4294967295/lampe",
            1,
            &site(),
        )
        .unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedUrl { .. }));
    }

    #[test]
    fn garbage_page_number_is_malformed() {
        let err = page_number("https://www.kleinanzeigen.de/s-seite:x/lampe", &site()).unwrap_err();
        assert!(matches!(err, ScrapeError::MalformedUrl { .. }));
    }
}
