//! Decoded `AddToken` event.

use alloy::primitives::{Address, B256};

/// A validated token-registration event from the watched contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAdded {
    /// Newly supported token.
    pub currency: Address,
    /// Price feed registered for it.
    pub price_feed: Address,
    /// Whether the token uses a fixed price.
    pub fixed_price: bool,
    /// Originating transaction.
    pub tx_hash: B256,
    /// Block the log was included in.
    pub block_number: u64,
}

impl TokenAdded {
    /// Checksummed currency address.
    pub fn currency_checksum(&self) -> String {
        self.currency.to_checksum(None)
    }

    /// Checksummed price-feed address.
    pub fn price_feed_checksum(&self) -> String {
        self.price_feed.to_checksum(None)
    }
}
