//! A typed change feed for list views.
//!
//! Every successful mutation (an ingested upload, a delete, a repair run that
//! renamed something) bumps a revision counter. Views hold a receiver and
//! reload when the revision moves, instead of listening for untyped
//! "refresh" broadcasts.

use std::sync::Arc;

use tokio::sync::watch;

/// Monotonically increasing revision shared by all subscribers.
///
/// Cloning is cheap; clones publish to the same channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
  tx: Arc<watch::Sender<u64>>,
}

impl ChangeFeed {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(0);
    Self { tx: Arc::new(tx) }
  }

  /// The current revision.
  pub fn revision(&self) -> u64 { *self.tx.borrow() }

  /// Record a mutation and wake subscribers. Returns the new revision.
  pub fn bump(&self) -> u64 {
    let mut bumped = 0;
    self.tx.send_modify(|rev| {
      *rev += 1;
      bumped = *rev;
    });
    bumped
  }

  pub fn subscribe(&self) -> watch::Receiver<u64> { self.tx.subscribe() }
}

impl Default for ChangeFeed {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_see_bumps() {
    let feed = ChangeFeed::new();
    let mut rx = feed.subscribe();
    assert_eq!(feed.revision(), 0);

    assert_eq!(feed.bump(), 1);
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), 1);
  }

  #[test]
  fn clones_share_the_revision() {
    let feed = ChangeFeed::new();
    let other = feed.clone();
    other.bump();
    assert_eq!(feed.revision(), 1);
  }

  #[test]
  fn bump_without_subscribers_still_counts() {
    let feed = ChangeFeed::default();
    feed.bump();
    feed.bump();
    assert_eq!(feed.revision(), 2);
  }
}
