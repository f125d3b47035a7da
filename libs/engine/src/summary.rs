//! Diagnostic synthesis
//!
//! Folds the diagnostic stream into one entry per distinct (severity, text)
//! pair, listing the timestamps that produced it as compact ranges. Arrival
//! order does not matter, so parallel and sequential runs summarize the same.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use types::{Diagnostic, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub severity: Severity,
    pub text: String,
    pub timestamps: BTreeSet<usize>,
    pub occurrences: usize,
}

#[derive(Debug, Default, Clone)]
pub struct Summary {
    entries: BTreeMap<(Severity, String), SummaryEntry>,
    totals: BTreeMap<Severity, usize>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: &Diagnostic) {
        *self.totals.entry(diagnostic.severity).or_default() += 1;
        let entry = self
            .entries
            .entry((diagnostic.severity, diagnostic.text.clone()))
            .or_insert_with(|| SummaryEntry {
                severity: diagnostic.severity,
                text: diagnostic.text.clone(),
                timestamps: BTreeSet::new(),
                occurrences: 0,
            });
        entry.timestamps.insert(diagnostic.timestamp_index);
        entry.occurrences += 1;
    }

    /// Entries, most severe first, then by text
    pub fn entries(&self) -> Vec<&SummaryEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.text.cmp(&b.text)));
        entries
    }

    /// Total diagnostics recorded at `severity`
    pub fn count(&self, severity: Severity) -> usize {
        self.totals.get(&severity).copied().unwrap_or(0)
    }

    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}

impl<'d> FromIterator<&'d Diagnostic> for Summary {
    fn from_iter<I: IntoIterator<Item = &'d Diagnostic>>(iter: I) -> Self {
        let mut summary = Summary::new();
        for diagnostic in iter {
            summary.add(diagnostic);
        }
        summary
    }
}

/// Group diagnostics by severity and text
pub fn synthesize<'d>(diagnostics: impl IntoIterator<Item = &'d Diagnostic>) -> Summary {
    diagnostics.into_iter().collect()
}

/// `{0,1,2,3,7,9,10}` → `"0-3, 7, 9-10"`
pub fn format_ranges(indices: &BTreeSet<usize>) -> String {
    let mut parts = Vec::new();
    let mut iter = indices.iter().copied();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut end = start;

    for i in iter {
        if i == end + 1 {
            end = i;
            continue;
        }
        parts.push(range_text(start, end));
        start = i;
        end = i;
    }
    parts.push(range_text(start, end));
    parts.join(", ")
}

fn range_text(start: usize, end: usize) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} errors, {} warnings, {} infos ({} distinct messages)",
            self.count(Severity::Error),
            self.count(Severity::Warn),
            self.count(Severity::Info),
            self.distinct()
        )?;
        for entry in self.entries() {
            writeln!(
                f,
                "[{}] {} (x{}, timestamps: {})",
                entry.severity,
                entry.text,
                entry.occurrences,
                format_ranges(&entry.timestamps)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ranges() {
        let set: BTreeSet<usize> = [0, 1, 2, 3, 7, 9, 10].into_iter().collect();
        assert_eq!(format_ranges(&set), "0-3, 7, 9-10");
        assert_eq!(format_ranges(&BTreeSet::new()), "");
        assert_eq!(format_ranges(&[5].into_iter().collect()), "5");
    }

    #[test]
    fn test_grouping_ignores_arrival_order() {
        let diags = vec![
            Diagnostic::new(2, None, Severity::Error, "a"),
            Diagnostic::new(0, None, Severity::Error, "a"),
            Diagnostic::new(1, None, Severity::Info, "b"),
            Diagnostic::new(1, None, Severity::Error, "a"),
        ];
        let forward = synthesize(&diags);
        let backward = synthesize(diags.iter().rev());

        let a: Vec<_> = forward.entries().into_iter().cloned().collect();
        let b: Vec<_> = backward.entries().into_iter().cloned().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].severity, Severity::Error);
        assert_eq!(format_ranges(&a[0].timestamps), "0-2");
        assert_eq!(forward.count(Severity::Error), 3);
        assert!(forward.has_errors());
    }

    #[test]
    fn test_display() {
        let diags = vec![Diagnostic::new(4, None, Severity::Warn, "odd")];
        let text = synthesize(&diags).to_string();
        assert!(text.starts_with("0 errors, 1 warnings, 0 infos"));
        assert!(text.contains("[warn] odd (x1, timestamps: 4)"));
    }
}
