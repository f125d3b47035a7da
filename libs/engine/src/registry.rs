//! # Verb Registry
//!
//! Static table from rule verb to predicate. Built once on first use and
//! shared read-only by every worker.
//!
//! - `pre_check`: the predicate also runs when the examined field is absent
//! - `element_wise`: on a repeated field the predicate runs once per element

use crate::engine::{Checker, Verdict};
use crate::predicates;
use codec::Navigator;
use once_cell::sync::Lazy;
use rules::{Rule, VerbCatalog};
use std::collections::HashMap;

/// Predicate signature shared by every verb
pub type Predicate = for<'c, 'e, 'a> fn(&'c mut Checker<'e, 'a>, &Navigator<'a>, &Rule) -> Verdict;

#[derive(Clone, Copy)]
pub struct VerbSpec {
    pub name: &'static str,
    pub pre_check: bool,
    pub element_wise: bool,
    pub check: Predicate,
}

impl std::fmt::Debug for VerbSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerbSpec")
            .field("name", &self.name)
            .field("pre_check", &self.pre_check)
            .field("element_wise", &self.element_wise)
            .finish()
    }
}

fn verb(name: &'static str, check: Predicate) -> VerbSpec {
    VerbSpec {
        name,
        pre_check: false,
        element_wise: true,
        check,
    }
}

fn pre_check(name: &'static str, check: Predicate) -> VerbSpec {
    VerbSpec {
        name,
        pre_check: true,
        element_wise: false,
        check,
    }
}

fn on_container(name: &'static str, check: Predicate) -> VerbSpec {
    VerbSpec {
        name,
        pre_check: false,
        element_wise: false,
        check,
    }
}

/// Deprecated spellings and the verbs they load as
const ALIASES: &[(&str, &str)] = &[
    ("is_equal", "is_equal_to"),
    ("is_different", "is_different_to"),
];

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::builtin);

#[derive(Debug)]
pub struct Registry {
    verbs: HashMap<&'static str, VerbSpec>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Registry {
    /// Process-wide registry with every built-in verb
    pub fn global() -> &'static Registry {
        &REGISTRY
    }

    fn builtin() -> Self {
        let specs = [
            pre_check("is_set", predicates::is_set),
            pre_check("is_set_if", predicates::is_set_if),
            pre_check("check_if", predicates::check_if),
            verb("is_valid", predicates::is_valid),
            verb("check_children", predicates::check_children),
            verb("is_greater_than", predicates::is_greater_than),
            verb("is_greater_than_or_equal_to", predicates::is_greater_than_or_equal_to),
            verb("is_less_than", predicates::is_less_than),
            verb("is_less_than_or_equal_to", predicates::is_less_than_or_equal_to),
            verb("is_equal_to", predicates::is_equal_to),
            verb("is_different_to", predicates::is_different_to),
            verb("in_range", predicates::in_range),
            verb("is_globally_unique", predicates::is_globally_unique),
            verb("refers_to", predicates::refers_to),
            verb("is_iso_country_code", predicates::is_iso_country_code),
            on_container("first_element", predicates::first_element),
            on_container("last_element", predicates::last_element),
            on_container("is_optional", predicates::is_optional),
        ];

        Self {
            verbs: specs.into_iter().map(|s| (s.name, s)).collect(),
            aliases: ALIASES.iter().copied().collect(),
        }
    }

    /// Definition of a verb or one of its aliases
    pub fn get(&self, verb: &str) -> Option<&VerbSpec> {
        let name = self.aliases.get(verb).copied().unwrap_or(verb);
        self.verbs.get(name)
    }

    pub fn contains(&self, verb: &str) -> bool {
        self.get(verb).is_some()
    }

    /// Canonical verb names, sorted
    pub fn verbs(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.verbs.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }
}

impl VerbCatalog for Registry {
    fn canonical(&self, verb: &str) -> Option<&'static str> {
        self.get(verb).map(|spec| spec.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_verbs() {
        let registry = Registry::global();
        assert_eq!(registry.len(), 18);
        for name in ["is_set", "is_set_if", "in_range", "refers_to", "check_if", "is_optional"] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert!(!registry.contains("is_sett"));
    }

    #[test]
    fn test_flags() {
        let registry = Registry::global();
        assert!(registry.get("is_set").unwrap().pre_check);
        assert!(registry.get("check_if").unwrap().pre_check);
        assert!(!registry.get("in_range").unwrap().pre_check);
        assert!(registry.get("in_range").unwrap().element_wise);
        assert!(!registry.get("first_element").unwrap().element_wise);
    }

    #[test]
    fn test_aliases_resolve_to_canonical() {
        let registry = Registry::global();
        assert_eq!(registry.canonical("is_equal"), Some("is_equal_to"));
        assert_eq!(registry.canonical("is_different"), Some("is_different_to"));
        assert_eq!(registry.canonical("is_equal_to"), Some("is_equal_to"));
        assert_eq!(registry.canonical("nope"), None);
    }
}
