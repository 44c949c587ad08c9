//! Listing Source Port - Full Listing Snapshot Interface

use async_trait::async_trait;

use crate::domain::{FetchError, Snapshot};

/// Anything that can produce a complete listing snapshot.
#[async_trait]
pub trait ListingSource: Send + Sync + 'static {
  /// Fetch the full current listing.
  ///
  /// A failed fetch is an error, never an empty snapshot.
  async fn fetch(&self) -> Result<Snapshot, FetchError>;
}
