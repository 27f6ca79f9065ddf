//! CODEOWNERS parsing and pattern matching.
//!
//! Patterns follow the hosting platform's rules rather than plain gitignore:
//!
//! - `/docs/*.md` is anchored at the repository root
//! - `*.rb` or `config/app.yml` (no leading slash) match at any depth
//! - `docs/` (trailing slash) matches everything below the directory
//!
//! Sections (`[Backend]`, `^[Optional][2] @default-owner`) group entries; within
//! a section the last matching entry wins.

use std::collections::BTreeMap;

use glob::{MatchOptions, Pattern};
use tracing::warn;

use crate::models::{CodeOwnerEntry, UserId, DEFAULT_SECTION};
use crate::Error;

#[cfg(test)]
#[path = "codeowners_tests.rs"]
mod tests;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled CODEOWNERS pattern.
#[derive(Debug, Clone)]
pub struct CodeOwnerPattern {
    raw: String,
    compiled: Option<Pattern>,
}

impl CodeOwnerPattern {
    /// Compiles a pattern. Patterns that are not valid globs never match.
    pub fn new(raw: &str) -> Self {
        let normalized = normalize_pattern(raw);
        let compiled = match Pattern::new(&normalized) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = raw, error = %e, "Ignoring invalid CODEOWNERS pattern");
                None
            }
        };

        Self {
            raw: raw.to_string(),
            compiled,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern matches a repository-relative path.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.compiled
            .as_ref()
            .map(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
            .unwrap_or(false)
    }
}

fn normalize_pattern(raw: &str) -> String {
    let (anchored, body) = match raw.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let mut pattern = if anchored || body.starts_with("**/") {
        body.to_string()
    } else {
        format!("**/{}", body)
    };

    if pattern.ends_with('/') {
        pattern.push_str("**/*");
    }

    pattern
}

/// One parsed line of a CODEOWNERS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeOwnerRule {
    pub pattern: String,
    pub section: String,
    /// Owner references as written: `@user`, `@group/subgroup`, or an email.
    pub owners: Vec<String>,
}

/// A parsed CODEOWNERS file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeOwnersFile {
    rules: Vec<CodeOwnerRule>,
}

impl CodeOwnersFile {
    /// Parses CODEOWNERS content.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCodeOwners` for a section header without a
    /// closing bracket.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let mut rules = Vec::new();
        let mut section = DEFAULT_SECTION.to_string();
        let mut section_defaults: Vec<String> = Vec::new();

        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') || line.starts_with("^[") {
                let (name, defaults) = parse_section_header(line, index + 1)?;
                section = name;
                section_defaults = defaults;
                continue;
            }

            let line = line.strip_prefix('\\').unwrap_or(line);
            let mut parts = line.split_whitespace();
            let Some(pattern) = parts.next() else {
                continue;
            };

            let mut owners: Vec<String> = parts
                .take_while(|part| !part.starts_with('#'))
                .map(|part| part.to_string())
                .collect();
            if owners.is_empty() {
                owners = section_defaults.clone();
            }

            rules.push(CodeOwnerRule {
                pattern: pattern.to_string(),
                section: section.clone(),
                owners,
            });
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[CodeOwnerRule] {
        &self.rules
    }

    /// The rule that owns `path` in each section (last match wins).
    pub fn rules_for_path(&self, path: &str) -> Vec<&CodeOwnerRule> {
        let mut by_section: BTreeMap<&str, &CodeOwnerRule> = BTreeMap::new();
        for rule in &self.rules {
            if CodeOwnerPattern::new(&rule.pattern).matches(path) {
                by_section.insert(rule.section.as_str(), rule);
            }
        }
        by_section.into_values().collect()
    }

    /// Converts the rules into entries, resolving owner references to users.
    ///
    /// Owners `resolve` does not know (unknown users, groups without members)
    /// are dropped; an entry whose owners all fail to resolve is still returned
    /// with no approvers.
    pub fn to_entries<F>(&self, resolve: F) -> Vec<CodeOwnerEntry>
    where
        F: Fn(&str) -> Option<UserId>,
    {
        self.rules
            .iter()
            .map(|rule| CodeOwnerEntry {
                pattern: rule.pattern.clone(),
                section: rule.section.clone(),
                approvers: rule.owners.iter().filter_map(|o| resolve(o)).collect(),
            })
            .collect()
    }
}

fn parse_section_header(line: &str, line_number: usize) -> Result<(String, Vec<String>), Error> {
    let body = line.strip_prefix('^').unwrap_or(line);
    let body = body.strip_prefix('[').unwrap_or(body);
    let Some(close) = body.find(']') else {
        return Err(Error::InvalidCodeOwners {
            line: line_number,
            reason: "section header is missing ']'".to_string(),
        });
    };

    let name = body[..close].trim().to_string();
    let mut rest = &body[close + 1..];

    // Optional approval count, e.g. `[Docs][2]`.
    if let Some(after) = rest.strip_prefix('[') {
        rest = after.find(']').map(|i| &after[i + 1..]).unwrap_or("");
    }

    let defaults = rest
        .split_whitespace()
        .take_while(|part| !part.starts_with('#'))
        .map(|part| part.to_string())
        .collect();

    Ok((name, defaults))
}
