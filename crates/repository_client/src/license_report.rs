//! License scanning reports.
//!
//! A [`LicenseScanReport`] lists the licenses detected by a pipeline's
//! dependency scan and the dependencies carrying each license. Reports from the
//! source branch and the target branch are compared with
//! [`LicenseScanReport::diff_with`] to find newly introduced licenses.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "license_report_tests.rs"]
mod tests;

/// A dependency found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// A detected license and the dependencies that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// SPDX identifier, when the scanner could classify the license.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl License {
    pub fn new(id: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            id: id.map(|i| i.to_string()),
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(Dependency::new(name));
        self
    }

    /// Identity used to compare licenses across reports.
    pub fn canonical_key(&self) -> String {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.name)
            .to_lowercase()
    }
}

/// Licenses added and removed between two reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseReportDiff {
    pub added: Vec<License>,
    pub removed: Vec<License>,
}

/// License findings of one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseScanReport {
    #[serde(default)]
    licenses: Vec<License>,
}

impl LicenseScanReport {
    pub fn new(licenses: Vec<License>) -> Self {
        Self { licenses }
    }

    /// An empty report, used when a pipeline has no license results.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn licenses(&self) -> &[License] {
        &self.licenses
    }

    pub fn is_empty(&self) -> bool {
        self.licenses.is_empty()
    }

    /// Names of all detected licenses.
    pub fn license_names(&self) -> Vec<String> {
        self.licenses.iter().map(|l| l.name.clone()).collect()
    }

    /// SPDX identifiers of all classified licenses.
    pub fn license_ids(&self) -> Vec<String> {
        self.licenses.iter().filter_map(|l| l.id.clone()).collect()
    }

    /// Names of every dependency in the report.
    pub fn dependency_names(&self) -> BTreeSet<String> {
        self.licenses
            .iter()
            .flat_map(|l| l.dependencies.iter().map(|d| d.name.clone()))
            .collect()
    }

    /// Compares this (baseline) report with `other`.
    ///
    /// `added` holds licenses present in `other` but not here, `removed` the
    /// opposite. Both lists are ordered by canonical key.
    pub fn diff_with(&self, other: &LicenseScanReport) -> LicenseReportDiff {
        let base = self.by_key();
        let head = other.by_key();

        let added = head
            .iter()
            .filter(|(key, _)| !base.contains_key(*key))
            .map(|(_, license)| (*license).clone())
            .collect();
        let removed = base
            .iter()
            .filter(|(key, _)| !head.contains_key(*key))
            .map(|(_, license)| (*license).clone())
            .collect();

        LicenseReportDiff { added, removed }
    }

    fn by_key(&self) -> BTreeMap<String, &License> {
        let mut map = BTreeMap::new();
        for license in &self.licenses {
            map.entry(license.canonical_key()).or_insert(license);
        }
        map
    }
}
