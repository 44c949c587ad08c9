//! Alert payloads handed to the notifier.

use std::fmt;

use super::event::TokenAdded;
use super::listing::ListingRecord;

/// Which detector raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// On-chain token registration.
    EventNewToken,
    /// New entry in the exchange listing.
    ListingNewToken,
}

impl AlertKind {
    /// Metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EventNewToken => "event_new_token",
            Self::ListingNewToken => "listing_new_token",
        }
    }
}

/// One alert: a title plus ordered `key: value` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    /// Source kind.
    pub kind: AlertKind,
    /// First line of the rendered text.
    pub title: String,
    /// Ordered structured fields.
    pub fields: Vec<(&'static str, String)>,
    /// Chat/channel id the alert goes to.
    pub destination: String,
}

impl AlertMessage {
    /// Alert for a decoded `AddToken` log.
    pub fn token_added(event: &TokenAdded, title: &str, destination: &str) -> Self {
        Self {
            kind: AlertKind::EventNewToken,
            title: title.to_string(),
            fields: vec![
                ("block", event.block_number.to_string()),
                ("tx", event.tx_hash.to_string()),
                ("currency", event.currency_checksum()),
                ("priceFeed", event.price_feed_checksum()),
                ("fixedPrice", event.fixed_price.to_string()),
            ],
            destination: destination.to_string(),
        }
    }

    /// Alert for a newly appeared listing.
    pub fn listing_added(record: &ListingRecord, title: &str, destination: &str) -> Self {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        Self {
            kind: AlertKind::ListingNewToken,
            title: title.to_string(),
            fields: vec![
                ("symbol", record.symbol.clone()),
                ("name", or_dash(&record.name)),
                ("chainId", or_dash(&record.chain_id)),
                ("contract", or_dash(&record.contract_address)),
            ],
            destination: destination.to_string(),
        }
    }

    /// Look up a field value.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Plain-text body: title, then one `key: value` line per field.
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)?;
        for (key, value) in &self.fields {
            write!(f, "\n{key}: {value}")?;
        }
        Ok(())
    }
}
