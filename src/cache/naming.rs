//! Cache partition names and version bookkeeping.
//!
//! Every cache the application owns is named `{app}-{partition}-{version}`.
//! Names are parsed back into their parts and compared structurally, so a
//! stale generation is recognized by its version field rather than by
//! string prefix alone.

use std::fmt;

/// The two logical cache buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
  /// Precached app shell assets
  Static,
  /// Opportunistically cached runtime responses
  Dynamic,
}

impl Partition {
  /// Every partition, in lookup order.
  pub const ALL: [Partition; 2] = [Partition::Dynamic, Partition::Static];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Static => "static",
      Self::Dynamic => "dynamic",
    }
  }

  fn parse(s: &str) -> Option<Self> {
    match s {
      "static" => Some(Self::Static),
      "dynamic" => Some(Self::Dynamic),
      _ => None,
    }
  }
}

impl fmt::Display for Partition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How a cache name relates to the running version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
  /// One of the partitions of the current version
  Current(Partition),
  /// Owned by this application but from another generation
  Stale,
  /// Not ours; never touched on activation
  Foreign,
}

/// Produces and classifies cache names for one application version.
#[derive(Debug, Clone)]
pub struct CacheNaming {
  app: String,
  version: String,
}

impl CacheNaming {
  pub fn new(app: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      app: app.into(),
      version: version.into(),
    }
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  /// Name of a partition for the current version.
  pub fn name(&self, partition: Partition) -> String {
    format!("{}-{}-{}", self.app, partition, self.version)
  }

  pub fn classify(&self, name: &str) -> Ownership {
    let Some(rest) = name
      .strip_prefix(self.app.as_str())
      .and_then(|r| r.strip_prefix('-'))
    else {
      return Ownership::Foreign;
    };

    // Older layouts such as `{app}-v1` carry no partition; they are still ours.
    match rest.split_once('-') {
      Some((partition, version)) => match Partition::parse(partition) {
        Some(p) if version == self.version => Ownership::Current(p),
        _ => Ownership::Stale,
      },
      None => Ownership::Stale,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn naming() -> CacheNaming {
    CacheNaming::new("piggyback", "v3")
  }

  #[test]
  fn test_names_embed_version() {
    let naming = naming();
    assert_eq!(naming.name(Partition::Static), "piggyback-static-v3");
    assert_eq!(naming.name(Partition::Dynamic), "piggyback-dynamic-v3");
  }

  #[test]
  fn test_current_partitions() {
    let naming = naming();
    for partition in Partition::ALL {
      assert_eq!(
        naming.classify(&naming.name(partition)),
        Ownership::Current(partition)
      );
    }
  }

  #[test]
  fn test_prior_versions_are_stale() {
    let naming = naming();
    assert_eq!(naming.classify("piggyback-static-v2"), Ownership::Stale);
    assert_eq!(naming.classify("piggyback-dynamic-v1"), Ownership::Stale);
    assert_eq!(naming.classify("piggyback-v1"), Ownership::Stale);
    assert_eq!(naming.classify("piggyback-images-v3"), Ownership::Stale);
  }

  #[test]
  fn test_other_apps_are_foreign() {
    let naming = naming();
    assert_eq!(naming.classify("workbox-precache-v3"), Ownership::Foreign);
    assert_eq!(naming.classify("piggybacker-static-v3"), Ownership::Foreign);
    assert_eq!(naming.classify("piggyback"), Ownership::Foreign);
  }

  #[test]
  fn test_version_with_dashes() {
    let naming = CacheNaming::new("piggyback", "2024-06-01");
    assert_eq!(
      naming.classify("piggyback-static-2024-06-01"),
      Ownership::Current(Partition::Static)
    );
    assert_eq!(
      naming.classify("piggyback-static-2024-05-01"),
      Ownership::Stale
    );
  }
}
