//! The closed set of domains the engine keeps series for.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::EngineError;
use crate::types::GLOBAL_DOMAIN;

/// Recognized domains, lowercased. Fixed for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainDirectory {
  domains: BTreeSet<String>,
}

impl DomainDirectory {
  /// Build from domain names. Blank entries are ignored; `"global"` is reserved.
  pub fn new<I, S>(domains: I) -> Result<Self, EngineError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut set = BTreeSet::new();
    for d in domains {
      let name = d.as_ref().trim().to_ascii_lowercase();
      if name.is_empty() {
        continue;
      }
      if name == GLOBAL_DOMAIN {
        return Err(EngineError::validation("domain", "\"global\" is a reserved series name"));
      }
      if name.contains('@') || name.chars().any(char::is_whitespace) {
        return Err(EngineError::validation("domain", &format!("{:?} is not a domain name", name)));
      }
      set.insert(name);
    }
    Ok(Self { domains: set })
  }

  /// One domain per line; `#` starts a comment.
  pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, EngineError> {
    let mut names = Vec::new();
    for line in reader.lines() {
      let line = line?;
      let entry = line.split('#').next().unwrap_or_default().trim();
      if !entry.is_empty() {
        names.push(entry.to_string());
      }
    }
    Self::new(names)
  }

  pub fn load(path: &Path) -> Result<Self, EngineError> {
    Self::from_reader(BufReader::new(File::open(path)?))
  }

  pub fn contains(&self, domain: &str) -> bool {
    self.domains.contains(domain)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.domains.iter().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.domains.len()
  }

  pub fn is_empty(&self) -> bool {
    self.domains.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_are_normalized() {
    let dir = DomainDirectory::new(["Dom1.COM", "  dom2.com ", ""]).unwrap();
    assert!(dir.contains("dom1.com"));
    assert!(dir.contains("dom2.com"));
    assert_eq!(dir.len(), 2);
  }

  #[test]
  fn global_is_reserved() {
    let err = DomainDirectory::new(["Global"]).unwrap_err();
    assert!(err.to_string().contains("reserved"));
  }

  #[test]
  fn reader_skips_comments_and_blanks() {
    let input = "# hosted domains\ndom1.com\n\ndom2.com  # secondary\n";
    let dir = DomainDirectory::from_reader(input.as_bytes()).unwrap();
    let names: Vec<&str> = dir.iter().collect();
    assert_eq!(names, vec!["dom1.com", "dom2.com"]);
  }
}
