//! Verb catalog seam
//!
//! The loader only needs to know whether a verb exists and what its
//! canonical name is. The engine's registry implements this trait, which
//! keeps `rules` free of any dependency on predicate code.

/// Lookup of known rule verbs
pub trait VerbCatalog {
    /// Canonical name for `verb` (aliases map to their target), or `None`
    /// if the verb is unknown.
    fn canonical(&self, verb: &str) -> Option<&'static str>;
}

/// Fixed verb list without aliases
#[derive(Debug, Clone, Copy)]
pub struct StaticCatalog(pub &'static [&'static str]);

impl VerbCatalog for StaticCatalog {
    fn canonical(&self, verb: &str) -> Option<&'static str> {
        self.0.iter().copied().find(|known| *known == verb)
    }
}

/// Verbs whose parameter is a mapping of element field names to rule lists
pub const ELEMENT_VERBS: &[&str] = &["first_element", "last_element"];

/// Verb whose parameter is a list of guard rules
pub const GUARD_VERB: &str = "check_if";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_catalog() {
        let catalog = StaticCatalog(&["is_set", "in_range"]);
        assert_eq!(catalog.canonical("is_set"), Some("is_set"));
        assert_eq!(catalog.canonical("is_sett"), None);
    }
}
