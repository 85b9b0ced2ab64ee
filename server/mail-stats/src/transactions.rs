//! Pending queue transactions, keyed by queue id.
//!
//! A `from=` record stays in the table after its first outcome: one queued
//! message may fan out to many recipients, each logged on its own `to=` line.
//! Entries live for the whole run and are dropped with the table.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TransactionTable {
  pending: HashMap<String, String>,
}

impl TransactionTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store (or overwrite) the sender for `txn_id`.
  pub fn record(&mut self, txn_id: &str, from: &str) {
    self.pending.insert(txn_id.to_string(), from.to_string());
  }

  /// Sender recorded for `txn_id`, if its `from=` line has been seen.
  pub fn lookup(&self, txn_id: &str) -> Option<&str> {
    self.pending.get(txn_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.pending.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }

  pub fn clear(&mut self) {
    self.pending.clear();
  }
}
