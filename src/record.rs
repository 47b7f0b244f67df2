use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No Title";
pub const NO_LINK: &str = "No Link";
pub const NO_PRICE: &str = "No Price";
pub const NO_LOCATION: &str = "No Location";
pub const NO_DATE: &str = "No Date";
pub const NO_DESCRIPTION: &str = "No Description";
pub const NO_DATE_POSTED: &str = "No Date Posted";
pub const NO_SELLER: &str = "No Seller Username";

/// One listing. Absent fields are `None` in memory and become their
/// sentinel text only when written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordRow", into = "RecordRow")]
pub struct ListingRecord {
    pub item_number: u64,
    pub title: Option<String>,
    /// Absolute URL, the join key for detail enrichment.
    pub link: Option<String>,
    pub price_raw: Option<String>,
    pub location: Option<String>,
    pub date_created_raw: Option<String>,
    /// Set once the detail page has been scraped for this record.
    pub detail: Option<DetailFields>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub description: Option<String>,
    pub date_posted_raw: Option<String>,
    pub seller_username: Option<String>,
}

impl ListingRecord {
    pub fn new(item_number: u64) -> Self {
        Self {
            item_number,
            title: None,
            link: None,
            price_raw: None,
            location: None,
            date_created_raw: None,
            detail: None,
        }
    }
}

// -------------------------
// On-disk shape
// -------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RecordRow {
    item_number: u64,
    title: String,
    link: String,
    price: String,
    location: String,
    date_created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_posted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seller_username: Option<String>,
}

fn to_text(value: Option<String>, sentinel: &str) -> String {
    value.unwrap_or_else(|| sentinel.to_string())
}

fn from_text(text: String, sentinel: &str) -> Option<String> {
    if text.is_empty() || text == sentinel {
        None
    } else {
        Some(text)
    }
}

impl From<ListingRecord> for RecordRow {
    fn from(r: ListingRecord) -> Self {
        let (description, date_posted, seller_username) = match r.detail {
            Some(d) => (
                Some(to_text(d.description, NO_DESCRIPTION)),
                Some(to_text(d.date_posted_raw, NO_DATE_POSTED)),
                Some(to_text(d.seller_username, NO_SELLER)),
            ),
            None => (None, None, None),
        };
        Self {
            item_number: r.item_number,
            title: to_text(r.title, NO_TITLE),
            link: to_text(r.link, NO_LINK),
            price: to_text(r.price_raw, NO_PRICE),
            location: to_text(r.location, NO_LOCATION),
            date_created: to_text(r.date_created_raw, NO_DATE),
            description,
            date_posted,
            seller_username,
        }
    }
}

impl From<RecordRow> for ListingRecord {
    fn from(row: RecordRow) -> Self {
        let enriched =
            row.description.is_some() || row.date_posted.is_some() || row.seller_username.is_some();
        let detail = enriched.then(|| DetailFields {
            description: row.description.and_then(|t| from_text(t, NO_DESCRIPTION)),
            date_posted_raw: row.date_posted.and_then(|t| from_text(t, NO_DATE_POSTED)),
            seller_username: row.seller_username.and_then(|t| from_text(t, NO_SELLER)),
        });
        Self {
            item_number: row.item_number,
            title: from_text(row.title, NO_TITLE),
            link: from_text(row.link, NO_LINK),
            price_raw: from_text(row.price, NO_PRICE),
            location: from_text(row.location, NO_LOCATION),
            date_created_raw: from_text(row.date_created, NO_DATE),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ListingRecord {
        ListingRecord {
            item_number: 7,
            title: Some("Rennrad 28 Zoll".into()),
            link: Some("https://www.kleinanzeigen.de/s-anzeige/rennrad/123".into()),
            price_raw: Some("250 € VB".into()),
            location: Some("10115 Mitte".into()),
            date_created_raw: Some("Heute, 10:15".into()),
            detail: None,
        }
    }

    #[test]
    fn full_record_survives_json() {
        let json = serde_json::to_string(&full()).unwrap();
        let back: ListingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, full());
    }

    #[test]
    fn absent_fields_are_written_as_sentinels() {
        let mut r = ListingRecord::new(1);
        r.title = Some("Lampe".into());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["title"], "Lampe");
        assert_eq!(v["link"], NO_LINK);
        assert_eq!(v["price"], NO_PRICE);
        assert_eq!(v["location"], NO_LOCATION);
        assert_eq!(v["date_created"], NO_DATE);
        assert!(v.get("description").is_none());
    }

    #[test]
    fn enriched_record_writes_every_detail_key() {
        let mut r = full();
        r.detail = Some(DetailFields {
            description: Some("Kaum gefahren".into()),
            ..Default::default()
        });
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["description"], "Kaum gefahren");
        assert_eq!(v["date_posted"], NO_DATE_POSTED);
        assert_eq!(v["seller_username"], NO_SELLER);

        let back: ListingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn rows_missing_keys_still_load() {
        let back: ListingRecord =
            serde_json::from_str(r#"{"item_number": 3, "title": "Tisch"}"#).unwrap();
        assert_eq!(back.title.as_deref(), Some("Tisch"));
        assert_eq!(back.link, None);
        assert_eq!(back.detail, None);
    }
}
