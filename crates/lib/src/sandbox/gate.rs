//! Known-helper allow-list consulted by the engine compiler.

use std::collections::BTreeSet;

/// Answers which helper names will exist at render time.
///
/// When `strict_only` is set, the engine treats any helper outside `names`
/// as a compile error. Otherwise the set is informational and unknown
/// helpers are left for runtime resolution. The gate only answers
/// membership; the engine decides what to do with the answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperGate {
  names: BTreeSet<String>,
  strict_only: bool,
}

impl HelperGate {
  pub fn new<I, S>(names: I, strict_only: bool) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
      strict_only,
    }
  }

  pub fn is_known(&self, name: &str) -> bool {
    self.names.contains(name)
  }

  pub fn strict_only(&self) -> bool {
    self.strict_only
  }

  /// Known helper names in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn membership_is_exact() {
    let gate = HelperGate::new(["formatDate", "link"], true);
    assert!(gate.is_known("link"));
    assert!(!gate.is_known("Link"));
    assert!(!gate.is_known("bold"));
    assert!(gate.strict_only());
  }

  #[test]
  fn names_are_sorted_and_deduplicated() {
    let gate = HelperGate::new(["b", "a", "b"], false);
    assert_eq!(gate.names().collect::<Vec<_>>(), vec!["a", "b"]);
  }

  #[test]
  fn default_gate_is_empty_and_lenient() {
    let gate = HelperGate::default();
    assert!(!gate.strict_only());
    assert_eq!(gate.names().count(), 0);
  }
}
