//! Target distributions shared by the build and release pipelines.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distributions built and published when nothing else is configured.
pub const DEFAULT_DISTRIBUTIONS: [&str; 4] = ["buster", "bionic", "focal", "bullseye"];

/// A distribution codename (e.g. `focal`).
///
/// Names are used verbatim as directory names, image tags and archive
/// suites, so only lowercase ASCII letters, digits, `-` and `.` are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Distribution(String);

impl Distribution {
    /// Validate and wrap a distribution name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
            && !name.starts_with('.');
        if valid {
            Ok(Self(name))
        } else {
            Err(PipelineError::InvalidDistribution(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Distribution {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Distribution> for String {
    fn from(value: Distribution) -> Self {
        value.0
    }
}

/// Ordered, duplicate-free set of distributions.
///
/// Iteration order is the configured order; both pipelines walk it
/// front to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Distribution>", into = "Vec<Distribution>")]
pub struct DistributionSet(Vec<Distribution>);

impl DistributionSet {
    /// Build a set, rejecting empty input and repeated names.
    pub fn new(distributions: Vec<Distribution>) -> Result<Self> {
        if distributions.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one distribution is required".to_string(),
            ));
        }
        for (i, dist) in distributions.iter().enumerate() {
            if distributions[..i].contains(dist) {
                return Err(PipelineError::InvalidConfig(format!(
                    "distribution {dist} is listed twice"
                )));
            }
        }
        Ok(Self(distributions))
    }

    /// Parse a list of names.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dists = names
            .into_iter()
            .map(Distribution::new)
            .collect::<Result<Vec<_>>>()?;
        Self::new(dists)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Distribution> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|d| d.as_str() == name)
    }
}

impl Default for DistributionSet {
    fn default() -> Self {
        Self(
            DEFAULT_DISTRIBUTIONS
                .iter()
                .map(|name| Distribution(name.to_string()))
                .collect(),
        )
    }
}

impl TryFrom<Vec<Distribution>> for DistributionSet {
    type Error = PipelineError;

    fn try_from(value: Vec<Distribution>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DistributionSet> for Vec<Distribution> {
    fn from(value: DistributionSet) -> Self {
        value.0
    }
}

impl<'a> IntoIterator for &'a DistributionSet {
    type Item = &'a Distribution;
    type IntoIter = std::slice::Iter<'a, Distribution>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_order() {
        let set = DistributionSet::default();
        let names: Vec<&str> = set.iter().map(Distribution::as_str).collect();
        assert_eq!(names, vec!["buster", "bionic", "focal", "bullseye"]);
    }

    #[test]
    fn test_distribution_rejects_path_like_names() {
        assert!(Distribution::new("focal").is_ok());
        assert!(Distribution::new("ubuntu-22.04").is_ok());
        assert!(Distribution::new("").is_err());
        assert!(Distribution::new("../etc").is_err());
        assert!(Distribution::new("Focal").is_err());
        assert!(Distribution::new(".hidden").is_err());
    }

    #[test]
    fn test_set_rejects_duplicates_and_empty() {
        assert!(DistributionSet::from_names(["focal", "focal"]).is_err());
        assert!(DistributionSet::from_names(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_contains() {
        let set = DistributionSet::from_names(["jammy", "bookworm"]).unwrap();
        assert!(set.contains("jammy"));
        assert!(!set.contains("focal"));
        assert_eq!(set.len(), 2);
    }
}
