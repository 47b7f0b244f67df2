use std::fmt::Write as _;

use serde::Serialize;

use crate::{
    config::SiteProfile,
    diagnostics::{Diagnostic, DiagnosticsSink},
    error::PriceParseError,
    record::ListingRecord,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceStatsSummary {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub priced_count: usize,
    pub negotiable_count: usize,
    pub total_count: usize,
    /// Lexicographic min and max of the raw date strings.
    pub date_range: Option<(String, String)>,
}

/// Keep digits and the decimal comma, then read the comma as a dot.
/// Dots are dropped, so `1.250 €` reads as 1250.
pub fn parse_price(raw: &str) -> Result<f64, PriceParseError> {
    let normalized: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    normalized.parse::<f64>().map_err(|_| PriceParseError {
        raw: raw.to_string(),
        normalized,
    })
}

pub fn summarize(
    records: &[ListingRecord],
    site: &SiteProfile,
    sink: &dyn DiagnosticsSink,
) -> PriceStatsSummary {
    let mut prices = Vec::new();
    let mut negotiable_count = 0;
    let mut dates: Vec<&str> = Vec::new();

    for record in records {
        if let Some(raw) = record.price_raw.as_deref() {
            if raw.contains(site.currency_marker.as_str()) {
                if raw.contains(site.negotiable_marker.as_str()) {
                    negotiable_count += 1;
                }
                match parse_price(raw) {
                    Ok(p) => prices.push(p),
                    Err(e) => sink.record(Diagnostic::PriceUnparseable {
                        item_number: record.item_number,
                        raw: raw.to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
        if let Some(date) = record.date_created_raw.as_deref() {
            dates.push(date);
        }
    }

    if prices.is_empty() {
        return PriceStatsSummary {
            negotiable_count,
            total_count: records.len(),
            ..Default::default()
        };
    }

    let sum: f64 = prices.iter().sum();
    let max = prices.iter().copied().fold(f64::MIN, f64::max);
    let min = prices.iter().copied().fold(f64::MAX, f64::min);
    // TODO: order by calendar date once the relative forms ("Heute", "Gestern") are resolved
    let date_range = match (dates.iter().min(), dates.iter().max()) {
        (Some(lo), Some(hi)) => Some((lo.to_string(), hi.to_string())),
        _ => None,
    };

    PriceStatsSummary {
        average: sum / prices.len() as f64,
        max,
        min,
        priced_count: prices.len(),
        negotiable_count,
        total_count: records.len(),
        date_range,
    }
}

impl PriceStatsSummary {
    /// The human-readable companion to a saved record set.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Average Price: {:.2} €", self.average);
        let _ = writeln!(out, "Highest Price: {:.2} €", self.max);
        let _ = writeln!(out, "Lowest Price: {:.2} €", self.min);
        let _ = writeln!(out, "Total Items with Price: {}", self.priced_count);
        let _ = writeln!(
            out,
            "Total Listings with Negotiable Prices: {}",
            self.negotiable_count
        );
        let _ = writeln!(out, "Total Listings: {}", self.total_count);
        match &self.date_range {
            Some((lo, hi)) => {
                let _ = writeln!(out, "Date Range of Listings: {lo} to {hi}");
            }
            None => {
                let _ = writeln!(out, "Date Range of Listings: n/a");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    fn priced(n: u64, price: &str, date: Option<&str>) -> ListingRecord {
        let mut r = ListingRecord::new(n);
        r.price_raw = Some(price.to_string());
        r.date_created_raw = date.map(str::to_string);
        r
    }

    #[test]
    fn parses_locale_prices() {
        assert_eq!(parse_price("19,99 €").unwrap(), 19.99);
        assert_eq!(parse_price("VB 5 €").unwrap(), 5.0);
        assert_eq!(parse_price("1.250 €").unwrap(), 1250.0);
        assert!(parse_price("€").is_err());
    }

    #[test]
    fn aggregates_currency_prices_only() {
        let sink = CollectingSink::new();
        let records = vec![
            priced(1, "19,99 €", Some("12.05.2024")),
            priced(2, "VB 5 €", Some("03.05.2024")),
            priced(3, "Kein Preis", None),
        ];
        let s = summarize(&records, &SiteProfile::default(), &sink);

        assert_eq!(s.priced_count, 2);
        assert_eq!(s.negotiable_count, 1);
        assert_eq!(s.total_count, 3);
        assert!((s.average - 12.495).abs() < 1e-9);
        assert_eq!(s.max, 19.99);
        assert_eq!(s.min, 5.0);
        assert_eq!(
            s.date_range,
            Some(("03.05.2024".to_string(), "12.05.2024".to_string()))
        );
        assert!(sink.events().is_empty());
    }

    #[test]
    fn unparseable_price_is_logged_and_skipped() {
        let sink = CollectingSink::new();
        let records = vec![priced(1, "€ VB", None), priced(2, "10 €", None)];
        let s = summarize(&records, &SiteProfile::default(), &sink);

        assert_eq!(s.priced_count, 1);
        assert_eq!(s.negotiable_count, 1);
        assert_eq!(s.total_count, 2);
        assert!(matches!(
            sink.events().as_slice(),
            [Diagnostic::PriceUnparseable { item_number: 1, .. }]
        ));
    }

    #[test]
    fn nothing_priced_reports_zeros() {
        let sink = CollectingSink::new();
        let records = vec![
            priced(1, "Zu verschenken", Some("Heute, 09:00")),
            ListingRecord::new(2),
        ];
        let s = summarize(&records, &SiteProfile::default(), &sink);

        assert_eq!(s.average, 0.0);
        assert_eq!(s.max, 0.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.priced_count, 0);
        assert_eq!(s.total_count, 2);
        assert_eq!(s.date_range, None);
        assert!(s.render().contains("Date Range of Listings: n/a"));
    }
}
