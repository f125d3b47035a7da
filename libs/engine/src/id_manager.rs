//! # Identifier Manager
//!
//! Per-top-level-message bookkeeping for `is_globally_unique` and
//! `refers_to`. Registration never fails; all checking happens when the
//! engine resolves the manager after traversal:
//!
//! ```text
//! Empty ──register/refer──► Registering ──resolve_unicity──► resolve_references ──► Resolved
//!   ▲                                                                                 │
//!   └──────────────────────────────── reset (next message) ───────────────────────────┘
//! ```
//!
//! Owners are kept as navigators so diagnostics can name their type and so
//! reference conditions can be evaluated against the owning message.

use crate::expr::evaluate;
use crate::logger::Reporter;
use crate::projection::Projection;
use codec::Navigator;
use std::collections::HashMap;
use tracing::debug;

/// Pending `refers_to` assertion
#[derive(Debug, Clone)]
pub struct Reference<'a> {
    pub referrer: Navigator<'a>,
    pub id: u64,
    pub expected_type: String,
    pub condition: Option<String>,
}

#[derive(Debug, Default)]
pub struct IdManager<'a> {
    /// Identifier values in first-registration order
    order: Vec<u64>,
    index: HashMap<u64, Vec<Navigator<'a>>>,
    references: Vec<Reference<'a>>,
}

impl<'a> IdManager<'a> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            index: HashMap::new(),
            references: Vec::new(),
        }
    }

    /// Record `owner` as carrying identifier `id`
    pub fn register_message(&mut self, id: u64, owner: Navigator<'a>) -> bool {
        let owners = self.index.entry(id).or_insert_with(|| {
            self.order.push(id);
            Vec::new()
        });
        owners.push(owner);
        true
    }

    pub fn refer(
        &mut self,
        referrer: Navigator<'a>,
        id: u64,
        expected_type: impl Into<String>,
        condition: Option<String>,
    ) {
        self.references.push(Reference {
            referrer,
            id,
            expected_type: expected_type.into(),
            condition,
        });
    }

    pub fn owners(&self, id: u64) -> &[Navigator<'a>] {
        self.index.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn id_count(&self) -> usize {
        self.order.len()
    }

    pub fn references(&self) -> &[Reference<'a>] {
        &self.references
    }

    pub fn reset(&mut self) {
        self.order.clear();
        self.index.clear();
        self.references.clear();
    }

    /// Report identifiers carried by more than one object.
    ///
    /// Two owners of the same type make it an error, otherwise a warning.
    pub fn resolve_unicity(&self, reporter: &mut Reporter<'_>) {
        for id in &self.order {
            let owners = self.owners(*id);
            if owners.len() < 2 {
                continue;
            }

            let mut per_type: Vec<(String, usize)> = Vec::new();
            for owner in owners {
                let name = owner.type_name();
                match per_type.iter_mut().find(|(t, _)| *t == name) {
                    Some((_, count)) => *count += 1,
                    None => per_type.push((name, 1)),
                }
            }

            let listing = per_type
                .iter()
                .map(|(t, n)| format!("{} ({})", t, n))
                .collect::<Vec<_>>()
                .join(", ");

            if per_type.iter().any(|(_, n)| *n > 1) {
                reporter.error(format!(
                    "Several objects of the same type have the ID {}: {}",
                    id, listing
                ));
            } else {
                reporter.warn(format!("Several objects have the ID {}: {}", id, listing));
            }
        }
    }

    /// Settle every pending reference against the registered owners
    pub fn resolve_references(&self, reporter: &mut Reporter<'_>) {
        for reference in &self.references {
            let candidates: Vec<&Navigator<'a>> = self
                .owners(reference.id)
                .iter()
                .filter(|owner| owner.type_name() == reference.expected_type)
                .collect();

            if candidates.is_empty() {
                debug!(
                    "{} -> {} (ID: {}) unresolved",
                    reference.referrer.path(),
                    reference.expected_type,
                    reference.id
                );
                reporter.error(format!(
                    "Reference unresolved: {} (ID: {})",
                    reference.expected_type, reference.id
                ));
                continue;
            }

            let Some(condition) = &reference.condition else {
                debug!(
                    "{} -> {} (ID: {}) resolved",
                    reference.referrer.path(),
                    reference.expected_type,
                    reference.id
                );
                continue;
            };

            let mut satisfied = false;
            for owner in &candidates {
                match evaluate(condition, &Projection::new(owner)) {
                    Ok(true) => {
                        satisfied = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        reporter.info(format!(
                            "{}: reference condition '{}' skipped: {}",
                            reference.referrer.path(),
                            condition,
                            e
                        ));
                        satisfied = true;
                        break;
                    }
                }
            }

            if satisfied {
                debug!(
                    "{} -> {} (ID: {}) satisfies '{}'",
                    reference.referrer.path(),
                    reference.expected_type,
                    reference.id,
                    condition
                );
            } else {
                reporter.error(format!(
                    "Reference condition not met: {} (ID: {}) from {}: {}",
                    reference.expected_type,
                    reference.id,
                    reference.referrer.path(),
                    condition
                ));
            }
        }
    }
}
