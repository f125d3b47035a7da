//! # Rule Tree
//!
//! ## Layout
//!
//! ```text
//! RuleTree.types (arena)
//! [0] root ──nested──► [1] GroundTruth ──fields──► country_code: [is_iso_country_code]
//!      │                    └──nested──► [4] dimension (well-known block)
//!      ├──nested──► [2] MovingObject ──fields──► id: [is_globally_unique]
//!      └──nested──► [3] dimension      ──fields──► length: [is_greater_than: 0]
//! ```
//!
//! Type nodes reference each other by [`TypeId`]; the tree is immutable once
//! loading finishes and is shared read-only by every worker.

use crate::error::{RuleLoadError, RuleLoadResult};
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::Path;
use types::Severity;

/// Index of a [`TypeRules`] node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

impl TypeId {
    pub const ROOT: TypeId = TypeId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// One declared rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub verb: String,
    /// Verb argument, `Null` when the entry was a bare verb
    pub params: YamlValue,
    /// Reserved keys of the entry (`target`, `do_check`, `severity`, `condition`)
    pub extra_params: BTreeMap<String, YamlValue>,
    pub severity: Severity,
    pub field_name: String,
    /// Declaring type path followed by the field name
    pub path: Vec<String>,
    /// Dotted path of the field actually examined
    pub target: Option<String>,
    /// Expression attached to `refers_to`
    pub condition: Option<String>,
    /// Sub-rules run by `check_if` when every guard holds
    pub do_check: Vec<Rule>,
    /// Guards of `check_if`
    pub guards: Vec<Rule>,
    /// Element rules of `first_element` / `last_element`
    pub element_rules: Option<TypeId>,
}

impl Rule {
    pub fn new(verb: impl Into<String>, field_name: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            verb: verb.into(),
            params: YamlValue::Null,
            extra_params: BTreeMap::new(),
            severity: Severity::default(),
            field_name: field_name.into(),
            path,
            target: None,
            condition: None,
            do_check: Vec::new(),
            guards: Vec::new(),
            element_rules: None,
        }
    }

    pub fn with_params(mut self, params: YamlValue) -> Self {
        self.params = params;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Dotted declaration path, e.g. `MovingObject.id`
    pub fn declared_at(&self) -> String {
        self.path.join(".")
    }

    /// Parameters rendered the way rule files are usually read:
    /// `[0.0, 4.5, 'ro']`, `'MovingObject'`, `True`
    pub fn params_display(&self) -> String {
        let mut out = String::new();
        write_yaml(&mut out, &self.params);
        out
    }

    /// String parameter, if the verb took one
    pub fn param_str(&self) -> Option<&str> {
        self.params.as_str()
    }

    /// Numeric parameter, if the verb took one
    pub fn param_f64(&self) -> Option<f64> {
        self.params.as_f64()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.verb, self.params_display())
    }
}

fn write_yaml(out: &mut String, value: &YamlValue) {
    match value {
        YamlValue::Null => {}
        YamlValue::Bool(true) => out.push_str("True"),
        YamlValue::Bool(false) => out.push_str("False"),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                let _ = write!(out, "{}", i);
            } else if let Some(u) = n.as_u64() {
                let _ = write!(out, "{}", u);
            } else if let Some(f) = n.as_f64() {
                let _ = write!(out, "{:?}", f);
            }
        }
        YamlValue::String(s) => {
            let _ = write!(out, "'{}'", s);
        }
        YamlValue::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_yaml(out, item);
            }
            out.push(']');
        }
        YamlValue::Mapping(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_yaml(out, k);
                out.push_str(": ");
                write_yaml(out, v);
            }
            out.push('}');
        }
        YamlValue::Tagged(tagged) => write_yaml(out, &tagged.value),
    }
}

/// Rules declared for one field, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRules {
    pub field_name: String,
    /// Enclosing type path followed by the field name
    pub path: Vec<String>,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    pub fn get(&self, verb: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.verb == verb)
    }

    pub fn has(&self, verb: &str) -> bool {
        self.get(verb).is_some()
    }
}

/// Rules for one message type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeRules {
    /// Empty for the root
    pub name: String,
    pub path: Vec<String>,
    pub parent: Option<TypeId>,
    pub nested_types: BTreeMap<String, TypeId>,
    pub fields: BTreeMap<String, FieldRules>,
}

/// Arena of type nodes rooted at [`TypeId::ROOT`]
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTree {
    types: Vec<TypeRules>,
}

impl Default for RuleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleTree {
    pub fn new() -> Self {
        Self {
            types: vec![TypeRules::default()],
        }
    }

    pub fn root(&self) -> TypeId {
        TypeId::ROOT
    }

    pub fn type_rules(&self, id: TypeId) -> &TypeRules {
        &self.types[id.0]
    }

    /// Resolve a type path such as `["MovingObject", "VehicleAttributes"]`
    pub fn get_type<S: AsRef<str>>(&self, path: &[S]) -> Option<TypeId> {
        path.iter()
            .try_fold(TypeId::ROOT, |id, name| self.nested(id, name.as_ref()))
    }

    pub fn nested(&self, parent: TypeId, name: &str) -> Option<TypeId> {
        self.types[parent.0].nested_types.get(name).copied()
    }

    pub fn field(&self, id: TypeId, field_name: &str) -> Option<&FieldRules> {
        self.types[id.0].fields.get(field_name)
    }

    /// Number of type nodes, root included
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn rule_count(&self) -> usize {
        self.types
            .iter()
            .flat_map(|t| t.fields.values())
            .map(|f| f.rules.len())
            .sum()
    }

    /// Nested type `name` under `parent`, created on first use
    pub fn get_or_insert_type(&mut self, parent: TypeId, name: &str) -> TypeId {
        if let Some(id) = self.nested(parent, name) {
            return id;
        }
        let id = self.push_type(parent, name);
        self.types[parent.0].nested_types.insert(name.to_string(), id);
        id
    }

    /// Type node owned by a rule rather than reachable by name
    pub fn insert_detached_type(&mut self, parent: TypeId, name: &str) -> TypeId {
        self.push_type(parent, name)
    }

    fn push_type(&mut self, parent: TypeId, name: &str) -> TypeId {
        let mut path = self.types[parent.0].path.clone();
        path.push(name.to_string());
        let id = TypeId(self.types.len());
        self.types.push(TypeRules {
            name: name.to_string(),
            path,
            parent: Some(parent),
            ..Default::default()
        });
        id
    }

    /// Field entry of a type, created empty on first use
    pub fn field_entry(&mut self, id: TypeId, field_name: &str) -> &mut FieldRules {
        let path = self.types[id.0].path.clone();
        self.types[id.0]
            .fields
            .entry(field_name.to_string())
            .or_insert_with(|| {
                let mut path = path;
                path.push(field_name.to_string());
                FieldRules {
                    field_name: field_name.to_string(),
                    path,
                    rules: Vec::new(),
                }
            })
    }

    /// Append a rule, rejecting a second rule with the same verb.
    pub fn add_rule(&mut self, id: TypeId, rule: Rule, source: &Path) -> RuleLoadResult<()> {
        let field = self.field_entry(id, &rule.field_name);
        if field.has(&rule.verb) {
            return Err(RuleLoadError::DuplicateVerb {
                verb: rule.verb,
                field_path: field.path.join("."),
                path: source.to_path_buf(),
            });
        }
        field.rules.push(rule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(src: &str) -> YamlValue {
        serde_yaml::from_str(src).unwrap()
    }

    #[test]
    fn test_type_paths_are_unique() {
        let mut tree = RuleTree::new();
        let a = tree.get_or_insert_type(TypeId::ROOT, "MovingObject");
        let b = tree.get_or_insert_type(a, "VehicleAttributes");
        assert_eq!(tree.get_or_insert_type(TypeId::ROOT, "MovingObject"), a);
        assert_eq!(tree.get_type(&["MovingObject", "VehicleAttributes"][..]), Some(b));
        assert_eq!(tree.type_rules(b).path, vec!["MovingObject", "VehicleAttributes"]);
        assert_eq!(tree.get_type(&["Nope"][..]), None);
    }

    #[test]
    fn test_field_path_extends_type_path() {
        let mut tree = RuleTree::new();
        let t = tree.get_or_insert_type(TypeId::ROOT, "GroundTruth");
        let field = tree.field_entry(t, "country_code");
        assert_eq!(field.path, vec!["GroundTruth", "country_code"]);
    }

    #[test]
    fn test_duplicate_verb_rejected() {
        let mut tree = RuleTree::new();
        let t = tree.get_or_insert_type(TypeId::ROOT, "Identifier");
        let rule = Rule::new("is_set", "value", vec!["Identifier".into(), "value".into()]);
        tree.add_rule(t, rule.clone(), Path::new("osi_a.yml")).unwrap();
        let err = tree.add_rule(t, rule, Path::new("osi_b.yml")).unwrap_err();
        assert!(err.to_string().contains("Duplicate rule 'is_set' for Identifier.value"));
        assert_eq!(tree.rule_count(), 1);
    }

    #[test]
    fn test_params_display() {
        let rule = Rule::new("in_range", "length", vec![]).with_params(yaml("[0.0, 4.5, ro]"));
        assert_eq!(rule.to_string(), "in_range([0.0, 4.5, 'ro'])");

        let rule = Rule::new("refers_to", "id", vec![]).with_params(yaml("MovingObject"));
        assert_eq!(rule.params_display(), "'MovingObject'");

        let rule = Rule::new("is_greater_than", "x", vec![]).with_params(yaml("3"));
        assert_eq!(rule.params_display(), "3");

        let rule = Rule::new("is_set", "x", vec![]);
        assert_eq!(rule.to_string(), "is_set()");
    }
}
