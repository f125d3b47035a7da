//! # Rule Engine
//!
//! ## Traversal
//!
//! ```text
//! validate_timestamp(root)
//!   └─ check_message(msg, rules)              fields in descriptor order
//!        ├─ declared rules of the field       apply_rule → registry → predicate
//!        └─ populated message field           synthesized is_valid, per element
//!             └─ descend(child) → resolve_type → check_message(child, ...)
//!   └─ declared fields unknown to the type   pre-check verbs see them absent
//!   resolve_unicity → resolve_references
//! ```
//!
//! The [`Engine`] owns the immutable rule tree and is shared by reference
//! between workers. A [`Checker`] is built per top-level message and owns the
//! mutable state of that message: its identifier manager and its reporter.

use crate::id_manager::IdManager;
use crate::logger::{DiagnosticSink, Reporter};
use crate::registry::{Registry, VerbSpec};
use codec::{DynamicMessage, Navigator, NavigatorError};
use prost_reflect::{Kind, MessageDescriptor, ReflectMessage};
use rules::{FieldRules, Rule, RuleTree, TypeId, WELL_KNOWN_NESTED};
use tracing::trace;
use types::timestamp_ns;

/// Outcome of one predicate call
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Complies,
    /// Violation, with optional detail appended to the diagnostic
    Violates(Option<String>),
    /// The rule could not be evaluated; reported as info
    Skipped(String),
}

impl From<bool> for Verdict {
    fn from(ok: bool) -> Self {
        if ok {
            Verdict::Complies
        } else {
            Verdict::Violates(None)
        }
    }
}

/// Rule tree plus verb registry
#[derive(Debug)]
pub struct Engine {
    tree: RuleTree,
    registry: &'static Registry,
}

impl Engine {
    pub fn new(tree: RuleTree) -> Self {
        Self {
            tree,
            registry: Registry::global(),
        }
    }

    pub fn tree(&self) -> &RuleTree {
        &self.tree
    }

    pub fn registry(&self) -> &'static Registry {
        self.registry
    }

    /// Validate one decoded top-level message.
    ///
    /// Returns `true` when no error diagnostic was recorded for it.
    pub fn validate_message(&self, message: &DynamicMessage, timestamp_index: usize, sink: &dyn DiagnosticSink) -> bool {
        let root = Navigator::root(message);
        self.validate_timestamp(&root, timestamp_index, message_timestamp_ns(message), sink)
    }

    pub fn validate_timestamp(
        &self,
        root: &Navigator<'_>,
        timestamp_index: usize,
        timestamp_ns: Option<u64>,
        sink: &dyn DiagnosticSink,
    ) -> bool {
        let mut checker = Checker::new(self, Reporter::new(sink, timestamp_index, timestamp_ns));
        checker.validate_timestamp(root)
    }
}

/// In-message simulation time from the `timestamp` field
pub fn message_timestamp_ns(message: &DynamicMessage) -> Option<u64> {
    let fd = message.descriptor().get_field_by_name("timestamp")?;
    if !message.has_field(&fd) {
        return None;
    }
    let value = message.get_field(&fd);
    let timestamp = value.as_message()?;
    let seconds = timestamp
        .get_field_by_name("seconds")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let nanos = timestamp
        .get_field_by_name("nanos")
        .and_then(|v| v.as_u32())
        .unwrap_or(0);
    timestamp_ns(seconds, nanos)
}

/// Per-message traversal state
pub struct Checker<'e, 'a> {
    engine: &'e Engine,
    ids: IdManager<'a>,
    reporter: Reporter<'e>,
    /// Rules of the message currently being checked
    scope: Option<TypeId>,
}

impl<'e, 'a> Checker<'e, 'a> {
    pub fn new(engine: &'e Engine, reporter: Reporter<'e>) -> Self {
        Self {
            engine,
            ids: IdManager::new(),
            reporter,
            scope: None,
        }
    }

    pub fn ids(&self) -> &IdManager<'a> {
        &self.ids
    }

    pub(crate) fn ids_mut(&mut self) -> &mut IdManager<'a> {
        &mut self.ids
    }

    pub fn reporter(&self) -> &Reporter<'e> {
        &self.reporter
    }

    pub(crate) fn tree(&self) -> &'e RuleTree {
        &self.engine.tree
    }

    /// Traverse the whole message, then settle identifiers and references
    pub fn validate_timestamp(&mut self, root: &Navigator<'a>) -> bool {
        let Some(rules) = self.resolve_type(root, None) else {
            self.reporter
                .info(format!("No rules for type {}", root.type_name()));
            return true;
        };

        self.check_message(root, Some(rules));
        self.ids.resolve_unicity(&mut self.reporter);
        self.ids.resolve_references(&mut self.reporter);
        self.reporter.error_count() == 0
    }

    /// Validate a sub-message (or every element of a repeated one) against
    /// the rules of its type
    pub(crate) fn descend(&mut self, field: &Navigator<'a>) {
        if field.descriptor().is_none() {
            return;
        }
        for element in field.elements() {
            let rules = self.resolve_type(&element, self.scope);
            if rules.is_none() {
                self.reporter
                    .info(format!("{}: no rules for type {}", element.path(), element.type_name()));
            }
            self.check_message(&element, rules);
        }
    }

    fn check_message(&mut self, nav: &Navigator<'a>, rules: Option<TypeId>) {
        let Some(message) = nav.message() else {
            return;
        };
        let tree = self.tree();
        let saved = std::mem::replace(&mut self.scope, rules);

        for fd in message.descriptor().fields() {
            let declared = rules.and_then(|id| tree.field(id, fd.name()));
            let populated_message = matches!(fd.kind(), Kind::Message(_)) && nav.has_field(fd.name());
            if declared.is_none() && !populated_message {
                continue;
            }

            if let Some(field_rules) = declared {
                for rule in &field_rules.rules {
                    self.apply_rule(nav, rule);
                }
            }

            let recursed = declared
                .map(|f| f.has("is_valid") || f.has("check_children"))
                .unwrap_or(false);
            if populated_message && !recursed {
                if let Ok(child) = nav.get_field(fd.name()) {
                    self.descend(&child);
                }
            }
        }

        if let Some(id) = rules {
            for field_rules in unknown_fields(tree, id, &message.descriptor()) {
                for rule in &field_rules.rules {
                    self.apply_rule(nav, rule);
                }
            }
        }

        self.scope = saved;
    }

    /// Apply only the declared rules of `rules` to `nav`, without descending
    pub(crate) fn check_declared(&mut self, nav: &Navigator<'a>, rules: TypeId) {
        let tree = self.tree();
        let saved = std::mem::replace(&mut self.scope, Some(rules));
        let declared = &tree.type_rules(rules).fields;

        let ordered: Vec<&FieldRules> = match nav.descriptor() {
            Some(descriptor) => descriptor
                .fields()
                .filter_map(|fd| declared.get(fd.name()))
                .chain(unknown_fields(tree, rules, &descriptor))
                .collect(),
            None => declared.values().collect(),
        };
        for field_rules in ordered {
            for rule in &field_rules.rules {
                self.apply_rule(nav, rule);
            }
        }
        self.scope = saved;
    }

    /// Rule node for a message navigator
    fn resolve_type(&self, nav: &Navigator<'a>, enclosing: Option<TypeId>) -> Option<TypeId> {
        let tree = self.tree();
        let name = nav.name();

        if WELL_KNOWN_NESTED.contains(&name) {
            let nested = enclosing
                .and_then(|id| tree.nested(id, name))
                .or_else(|| tree.nested(TypeId::ROOT, name));
            if nested.is_some() {
                return nested;
            }
        }

        if name == "base" {
            let standalone = match nav.parent().map(|p| p.name()) {
                Some("moving_object") => Some("BaseMoving"),
                Some("stationary_object") => Some("BaseStationary"),
                _ => None,
            };
            if let Some(found) = standalone.and_then(|t| tree.get_type(&[t][..])) {
                return Some(found);
            }
        }

        nav.type_path().and_then(|path| tree.get_type(path.as_slice()))
    }

    /// Resolve the field a rule examines, relative to its enclosing message
    fn subject(&self, parent: &Navigator<'a>, rule: &Rule) -> Result<Navigator<'a>, String> {
        let Some(target) = &rule.target else {
            return match parent.get_field(&rule.field_name) {
                Err(NavigatorError::UnknownField { .. }) => Ok(parent.missing_field(&rule.field_name)),
                other => other.map_err(|e| e.to_string()),
            };
        };

        let path = target_path(target);
        let name = match path.rsplit('/').find(|c| !c.is_empty()) {
            Some(name) if name != ".." && name != "this" => name.to_string(),
            _ => return Err(format!("target '{}' does not name a field", target)),
        };
        let owner = parent
            .query(&path, true)
            .map_err(|e| format!("cannot resolve target '{}': {}", target, e))?;
        owner.get_field(&name).map_err(|e| e.to_string())
    }

    /// Dispatch one declared rule and report its outcome
    pub(crate) fn apply_rule(&mut self, parent: &Navigator<'a>, rule: &Rule) {
        let Some(spec) = self.engine.registry.get(&rule.verb).copied() else {
            self.reporter.info(format!(
                "{}.{}: unknown rule verb '{}', skipped",
                parent.path(),
                rule.field_name,
                rule.verb
            ));
            return;
        };

        let field = match self.subject(parent, rule) {
            Ok(field) => field,
            Err(reason) => {
                self.reporter
                    .info(format!("{}: {} skipped: {}", parent.path(), rule, reason));
                return;
            }
        };

        if !spec.pre_check && !field.is_present() {
            trace!("{}: absent, {} not applied", field.path(), rule.verb);
            return;
        }

        for target in targets(&spec, &field) {
            let verdict = (spec.check)(self, &target, rule);
            self.record(&target, rule, verdict);
        }
    }

    /// Evaluate a rule without reporting; used for `check_if` guards
    pub(crate) fn holds(&mut self, parent: &Navigator<'a>, rule: &Rule) -> bool {
        let Some(spec) = self.engine.registry.get(&rule.verb).copied() else {
            return false;
        };
        let Ok(field) = self.subject(parent, rule) else {
            return false;
        };
        if !spec.pre_check && !field.is_present() {
            return false;
        }
        targets(&spec, &field)
            .iter()
            .all(|target| (spec.check)(self, target, rule) == Verdict::Complies)
    }

    fn record(&mut self, field: &Navigator<'a>, rule: &Rule, verdict: Verdict) {
        match verdict {
            Verdict::Complies => {}
            Verdict::Violates(detail) => {
                let mut text = format!("{}: {} does not comply", field.path(), rule);
                if let Some(detail) = detail {
                    text.push_str(": ");
                    text.push_str(&detail);
                }
                self.reporter.report(rule.severity, text);
            }
            Verdict::Skipped(reason) => {
                self.reporter
                    .info(format!("{}: {} skipped: {}", field.path(), rule, reason));
            }
        }
    }
}

/// Declared field rules whose names the message type does not have
fn unknown_fields<'t>(tree: &'t RuleTree, rules: TypeId, descriptor: &MessageDescriptor) -> Vec<&'t FieldRules> {
    tree.type_rules(rules)
        .fields
        .iter()
        .filter(|(name, _)| descriptor.get_field_by_name(name).is_none())
        .map(|(_, field_rules)| field_rules)
        .collect()
}

/// Dotted rule target to a navigator query path; `..` climbs one level.
///
/// `this.base.length` → `this/base/length`, `this..id` → `this/../id`
fn target_path(target: &str) -> String {
    target
        .split("..")
        .map(|segment| segment.replace('.', "/"))
        .collect::<Vec<_>>()
        .join("/../")
}

fn targets<'a>(spec: &VerbSpec, field: &Navigator<'a>) -> Vec<Navigator<'a>> {
    if spec.element_wise && field.is_repeated() {
        field.elements()
    } else {
        vec![field.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemorySink;
    use codec::test_utils::new_message;
    use prost_reflect::Value;
    use rules::RuleLoader;
    use std::path::Path;
    use types::Severity;

    fn engine(yaml: &str) -> Engine {
        let mut loader = RuleLoader::new(Registry::global());
        loader.load_str(yaml, Path::new("osi_test.yml")).unwrap();
        Engine::new(loader.finish())
    }

    fn vector(x: f64) -> DynamicMessage {
        let mut v = new_message("Vector3d");
        v.set_field_by_name("x", Value::F64(x));
        v
    }

    #[test]
    fn test_missing_root_rules_is_info() {
        let engine = engine("MovingObject:\n  id:\n    - is_set\n");
        let gt = new_message("GroundTruth");
        let sink = MemorySink::new();
        assert!(engine.validate_message(&gt, 0, &sink));

        let out = sink.take();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Info);
        assert_eq!(out[0].text, "No rules for type GroundTruth");
    }

    #[test]
    fn test_declared_rule_violation_text() {
        let engine = engine("Vector3d:\n  x:\n    - is_greater_than: 0\n  y:\n    - is_set:\n      severity: warn\n");
        let sink = MemorySink::new();
        assert!(!engine.validate_message(&vector(-1.0), 4, &sink));

        let out = sink.take();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Vector3d.x: is_greater_than(0) does not comply");
        assert_eq!(out[0].timestamp_index, 4);
        assert_eq!(out[1].severity, Severity::Warn);
        assert_eq!(out[1].text, "Vector3d.y: is_set() does not comply");
    }

    #[test]
    fn test_absent_field_skips_ordinary_rules() {
        let engine = engine("Vector3d:\n  z:\n    - is_greater_than: 0\n");
        let sink = MemorySink::new();
        assert!(engine.validate_message(&vector(1.0), 0, &sink));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unknown_verb_is_info_at_dispatch() {
        let engine = engine("Vector3d:\n  x:\n    - is_prime\n");
        let sink = MemorySink::new();
        assert!(engine.validate_message(&vector(3.0), 0, &sink));

        let out = sink.take();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Info);
        assert!(out[0].text.contains("unknown rule verb 'is_prime'"));
    }

    #[test]
    fn test_unresolvable_target_is_info() {
        let engine = engine("Vector3d:\n  x:\n    - is_set:\n      target: this.nothing.here\n");
        let sink = MemorySink::new();
        assert!(engine.validate_message(&vector(3.0), 0, &sink));

        let out = sink.take();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Info);
        assert!(out[0].text.contains("skipped"));
    }

    #[test]
    fn test_recursion_reaches_repeated_elements() {
        let engine = engine(
            "GroundTruth:\n  country_code:\n    - is_optional\nMovingObject:\n  type:\n    - is_set\n",
        );
        let mut gt = new_message("GroundTruth");
        let mut typed = new_message("MovingObject");
        typed.set_field_by_name("type", Value::EnumNumber(2));
        gt.set_field_by_name(
            "moving_object",
            Value::List(vec![
                Value::Message(typed),
                Value::Message(new_message("MovingObject")),
            ]),
        );

        let sink = MemorySink::new();
        assert!(!engine.validate_message(&gt, 0, &sink));
        let errors: Vec<_> = sink
            .take()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text, "GroundTruth.moving_object.type: is_set() does not comply");
    }

    #[test]
    fn test_rule_on_undeclared_field_reports_absence() {
        let engine = engine("Vector3d:\n  w:\n    - is_set\n    - is_greater_than: 0\n");
        let sink = MemorySink::new();
        assert!(!engine.validate_message(&vector(1.0), 0, &sink));

        let out = sink.take();
        assert_eq!(out.len(), 1, "{out:?}");
        assert_eq!(out[0].severity, Severity::Error);
        assert_eq!(out[0].text, "Vector3d.w: is_set() does not comply");
    }

    #[test]
    fn test_target_path_parent_steps() {
        assert_eq!(target_path("this.base.length"), "this/base/length");
        assert_eq!(target_path("this..id"), "this/../id");
        assert_eq!(target_path("type"), "type");
    }

    #[test]
    fn test_target_climbs_to_enclosing_message() {
        let engine = engine(
            "
MovingObject:
  VehicleClassification:
    type:
      - is_set:
        target: this..id
",
        );
        let mut classification = new_message("MovingObject.VehicleClassification");
        classification.set_field_by_name("type", Value::I32(1));
        let mut object = new_message("MovingObject");
        object.set_field_by_name("vehicle_classification", Value::Message(classification));

        let sink = MemorySink::new();
        assert!(!engine.validate_message(&object, 0, &sink));
        let errors: Vec<_> = sink
            .take()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].text, "MovingObject.id: is_set() does not comply");
    }

    #[test]
    fn test_timestamp_extraction() {
        let mut ts = new_message("Timestamp");
        ts.set_field_by_name("seconds", Value::I64(2));
        ts.set_field_by_name("nanos", Value::U32(5));
        let mut gt = new_message("GroundTruth");
        assert_eq!(message_timestamp_ns(&gt), None);
        gt.set_field_by_name("timestamp", Value::Message(ts));
        assert_eq!(message_timestamp_ns(&gt), Some(2_000_000_005));
    }
}
