//! Pattern filter — classifies declarations by qualified name and source path.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::Options;

/// Classification assigned to a declaration during discovery.
///
/// `Enforced` beats `Excluded` beats `Ignored` beats `Included`; a
/// declaration matching nothing is `Ignored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    Included,
    Excluded,
    Enforced,
    Ignored,
}

/// The eight compiled pattern lists: {included, excluded, enforced, ignored}
/// × {name, source}. Patterns are compiled once at startup; classification is
/// a pure function of (qualified name, source path).
#[derive(Debug, Default)]
pub struct FilterSet {
    included_names: Vec<Regex>,
    included_sources: Vec<Regex>,
    excluded_names: Vec<Regex>,
    excluded_sources: Vec<Regex>,
    enforced_names: Vec<Regex>,
    enforced_sources: Vec<Regex>,
    ignored_names: Vec<Regex>,
    ignored_sources: Vec<Regex>,
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("invalid filter pattern `{p}`")))
        .collect()
}

fn matches_any(patterns: &[Regex], subject: &str) -> bool {
    patterns.iter().any(|p| p.is_match(subject))
}

impl FilterSet {
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            included_names: compile_patterns(&options.included_names)?,
            included_sources: compile_patterns(&options.included_sources)?,
            excluded_names: compile_patterns(&options.excluded_names)?,
            excluded_sources: compile_patterns(&options.excluded_sources)?,
            enforced_names: compile_patterns(&options.enforced_names)?,
            enforced_sources: compile_patterns(&options.enforced_sources)?,
            ignored_names: compile_patterns(&options.ignored_names)?,
            ignored_sources: compile_patterns(&options.ignored_sources)?,
        })
    }

    /// Classify one declaration. The priority order across categories is
    /// fixed: enforced, then excluded, then ignored, then included; within a
    /// category a name match and a source match are equivalent.
    pub fn classify(&self, name: &str, source: &str) -> FilterStatus {
        if matches_any(&self.enforced_names, name) || matches_any(&self.enforced_sources, source) {
            return FilterStatus::Enforced;
        }
        if matches_any(&self.excluded_names, name) || matches_any(&self.excluded_sources, source) {
            return FilterStatus::Excluded;
        }
        if matches_any(&self.ignored_names, name) || matches_any(&self.ignored_sources, source) {
            return FilterStatus::Ignored;
        }
        if matches_any(&self.included_names, name) || matches_any(&self.included_sources, source) {
            return FilterStatus::Included;
        }
        FilterStatus::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(f: impl FnOnce(Options) -> Options) -> FilterSet {
        FilterSet::new(&f(Options::default())).expect("compile filter")
    }

    #[test]
    fn unmatched_defaults_to_ignored() {
        let f = filter(|o| o.include_name("^foo$"));
        assert_eq!(f.classify("bar", "bar.h"), FilterStatus::Ignored);
    }

    #[test]
    fn include_by_name_and_source() {
        let f = filter(|o| o.include_name("^foo$").include_source("api\\.h$"));
        assert_eq!(f.classify("foo", "other.h"), FilterStatus::Included);
        assert_eq!(f.classify("bar", "/usr/include/api.h"), FilterStatus::Included);
    }

    #[test]
    fn excluded_beats_included() {
        let f = filter(|o| o.include_name("foo").exclude_name("^foo$"));
        assert_eq!(f.classify("foo", ""), FilterStatus::Excluded);
    }

    #[test]
    fn enforced_beats_everything() {
        let f = filter(|o| {
            o.include_name("foo")
                .exclude_name("foo")
                .ignore_name("foo")
                .enforce_name("^foo$")
        });
        assert_eq!(f.classify("foo", ""), FilterStatus::Enforced);
    }

    #[test]
    fn ignored_beats_included() {
        let f = filter(|o| o.include_name("foo").ignore_name("^foo$"));
        assert_eq!(f.classify("foo", ""), FilterStatus::Ignored);
    }

    #[test]
    fn patterns_are_search_not_anchored() {
        let f = filter(|o| o.include_name("Pizza"));
        assert_eq!(f.classify("Testo::Pizza::cheese", ""), FilterStatus::Included);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let options = Options::default().include_name("(unclosed");
        assert!(FilterSet::new(&options).is_err());
    }
}
