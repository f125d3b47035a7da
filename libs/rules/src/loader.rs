//! # YAML Rule Loader
//!
//! ## File shape
//!
//! ```yaml
//! MovingObject:                 # uppercase key: message type
//!   id:                         # lowercase key: field, list of rule entries
//!     - is_globally_unique
//!     - is_set
//!   VehicleClassification:      # nested message type
//!     type:
//!       - is_greater_than_or_equal_to: 0
//! dimension:                    # well-known structural field as a mapping:
//!   length:                     # rules shared by every `dimension` field
//!     - in_range: [0.0, 100.0]
//!       severity: warn
//! ```
//!
//! A rule entry is a bare verb or a one-verb mapping plus the reserved keys
//! `target`, `do_check`, `severity` and `condition`.

use crate::error::{RuleLoadError, RuleLoadResult};
use crate::tree::{Rule, RuleTree, TypeId};
use crate::verbs::{VerbCatalog, ELEMENT_VERBS, GUARD_VERB};
use serde_yaml::{Mapping, Value as YamlValue};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use types::Severity;

/// Structural field names whose mapping defines an implicit nested type
pub const WELL_KNOWN_NESTED: &[&str] = &[
    "dimension",
    "position",
    "velocity",
    "acceleration",
    "orientation",
    "orientation_rate",
    "orientation_acceleration",
];

const RESERVED_KEYS: &[&str] = &["target", "do_check", "severity", "condition"];

/// Builds a [`RuleTree`] from any number of rule sources
pub struct RuleLoader<'c> {
    catalog: &'c dyn VerbCatalog,
    tree: RuleTree,
    files_loaded: usize,
}

impl<'c> RuleLoader<'c> {
    pub fn new(catalog: &'c dyn VerbCatalog) -> Self {
        Self {
            catalog,
            tree: RuleTree::new(),
            files_loaded: 0,
        }
    }

    /// Load every `osi_*.yml` / `osi_*.yaml` file of `dir`, in name order.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> RuleLoadResult<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| RuleLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| RuleLoadError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && is_rule_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            warn!("No osi_*.yml rule files found in {}", dir.display());
        }
        for file in &files {
            self.load_file(file)?;
        }
        Ok(files.len())
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> RuleLoadResult<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(&text, path)
    }

    /// Load one YAML document; `source` is only used in error messages.
    pub fn load_str(&mut self, yaml: &str, source: &Path) -> RuleLoadResult<()> {
        let document: YamlValue = serde_yaml::from_str(yaml).map_err(|e| RuleLoadError::Yaml {
            path: source.to_path_buf(),
            source: e,
        })?;

        match document {
            YamlValue::Null => {}
            YamlValue::Mapping(map) => self.load_type_body(TypeId::ROOT, &map, source)?,
            _ => {
                return Err(RuleLoadError::malformed(
                    "<root>",
                    source,
                    "top level must be a mapping of type names",
                ))
            }
        }

        self.files_loaded += 1;
        debug!("Loaded rules from {}", source.display());
        Ok(())
    }

    /// Add a list of rule entries to a field; used by the Doxygen source.
    pub fn load_field_entries(
        &mut self,
        type_path: &[String],
        field_name: &str,
        entries: &YamlValue,
        source: &Path,
    ) -> RuleLoadResult<()> {
        let type_id = type_path
            .iter()
            .fold(TypeId::ROOT, |id, name| self.tree.get_or_insert_type(id, name));
        self.load_field(type_id, field_name, entries, source)
    }

    pub fn files_loaded(&self) -> usize {
        self.files_loaded
    }

    pub fn finish(self) -> RuleTree {
        info!(
            "Rule tree ready: {} types, {} rules from {} sources",
            self.tree.type_count() - 1,
            self.tree.rule_count(),
            self.files_loaded
        );
        self.tree
    }

    fn load_type_body(&mut self, type_id: TypeId, body: &Mapping, source: &Path) -> RuleLoadResult<()> {
        for (key, value) in body {
            let Some(key) = key.as_str() else {
                return Err(RuleLoadError::malformed(
                    self.type_display(type_id),
                    source,
                    format!("non-string key {:?}", key),
                ));
            };

            if key.starts_with(|c: char| c.is_ascii_uppercase()) {
                let nested = self.tree.get_or_insert_type(type_id, key);
                match value {
                    YamlValue::Mapping(map) => self.load_type_body(nested, map, source)?,
                    YamlValue::Null => {}
                    _ => {
                        return Err(RuleLoadError::malformed(
                            self.type_display(nested),
                            source,
                            "a message type must map to its fields",
                        ))
                    }
                }
            } else if WELL_KNOWN_NESTED.contains(&key) && value.is_mapping() {
                let nested = self.tree.get_or_insert_type(type_id, key);
                if let YamlValue::Mapping(map) = value {
                    self.load_type_body(nested, map, source)?;
                }
            } else {
                if type_id == TypeId::ROOT {
                    warn!("{}: field '{}' declared outside any message type", source.display(), key);
                }
                self.load_field(type_id, key, value, source)?;
            }
        }
        Ok(())
    }

    fn load_field(&mut self, type_id: TypeId, field: &str, entries: &YamlValue, source: &Path) -> RuleLoadResult<()> {
        self.tree.field_entry(type_id, field);
        let entries = match entries {
            YamlValue::Null => return Ok(()),
            YamlValue::Sequence(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };
        for entry in entries {
            let rule = self.parse_rule(type_id, field, entry, source)?;
            self.tree.add_rule(type_id, rule, source)?;
        }
        Ok(())
    }

    fn parse_rule(&mut self, type_id: TypeId, field: &str, entry: &YamlValue, source: &Path) -> RuleLoadResult<Rule> {
        let mut path = self.tree.type_rules(type_id).path.clone();
        path.push(field.to_string());
        let field_path = path.join(".");

        let (verb, params, extra) = match entry {
            YamlValue::String(verb) => (verb.clone(), YamlValue::Null, Mapping::new()),
            YamlValue::Mapping(map) => split_entry(map, &field_path, source)?,
            other => {
                return Err(RuleLoadError::malformed(
                    field_path,
                    source,
                    format!("expected a verb or a verb mapping, got {:?}", other),
                ))
            }
        };

        let verb = self.canonical_verb(&verb, &field_path, source);
        let mut rule = Rule::new(verb, field, path).with_params(params);

        for (key, value) in &extra {
            let Some(key) = key.as_str() else { continue };
            match key {
                "severity" => {
                    let text = value.as_str().unwrap_or_default();
                    rule.severity = text.parse::<Severity>().map_err(|_| RuleLoadError::InvalidSeverity {
                        value: text.to_string(),
                        field_path: field_path.clone(),
                    })?;
                }
                "target" => rule.target = value.as_str().map(str::to_string),
                "condition" => rule.condition = value.as_str().map(str::to_string),
                "do_check" => {
                    let items = value.as_sequence().map(Vec::as_slice).unwrap_or(std::slice::from_ref(value));
                    for item in items {
                        let sub = self.parse_rule(type_id, field, item, source)?;
                        rule.do_check.push(sub);
                    }
                }
                _ => {}
            }
            rule.extra_params.insert(key.to_string(), value.clone());
        }

        if rule.verb == GUARD_VERB {
            let guards = rule.params.clone();
            let items = guards.as_sequence().map(Vec::as_slice).unwrap_or(std::slice::from_ref(&guards));
            for item in items {
                let guard = self.parse_rule(type_id, field, item, source)?;
                rule.guards.push(guard);
            }
        }

        if ELEMENT_VERBS.contains(&rule.verb.as_str()) {
            let Some(map) = rule.params.as_mapping().cloned() else {
                return Err(RuleLoadError::malformed(
                    field_path,
                    source,
                    format!("{} expects a mapping of element fields to rules", rule.verb),
                ));
            };
            let element = self
                .tree
                .insert_detached_type(type_id, &format!("{}[{}]", field, rule.verb));
            self.load_type_body(element, &map, source)?;
            rule.element_rules = Some(element);
        }

        Ok(rule)
    }

    fn canonical_verb(&self, verb: &str, field_path: &str, source: &Path) -> String {
        match self.catalog.canonical(verb) {
            Some(canonical) if canonical != verb => {
                warn!(
                    "{} ({}): '{}' is deprecated, use '{}'",
                    field_path,
                    source.display(),
                    verb,
                    canonical
                );
                canonical.to_string()
            }
            Some(canonical) => canonical.to_string(),
            None => {
                warn!(
                    "{} ({}): unknown rule verb '{}', it will be skipped",
                    field_path,
                    source.display(),
                    verb
                );
                verb.to_string()
            }
        }
    }

    fn type_display(&self, id: TypeId) -> String {
        let path = &self.tree.type_rules(id).path;
        if path.is_empty() {
            "<root>".to_string()
        } else {
            path.join(".")
        }
    }
}

/// Split a rule mapping into (verb, params, reserved keys).
fn split_entry(map: &Mapping, field_path: &str, source: &Path) -> RuleLoadResult<(String, YamlValue, Mapping)> {
    let mut verb: Option<(String, YamlValue)> = None;
    let mut extra = Mapping::new();

    for (key, value) in map {
        let Some(name) = key.as_str() else {
            return Err(RuleLoadError::malformed(field_path, source, "rule keys must be strings"));
        };
        if RESERVED_KEYS.contains(&name) {
            extra.insert(key.clone(), value.clone());
        } else if let Some((first, _)) = &verb {
            return Err(RuleLoadError::malformed(
                field_path,
                source,
                format!("entry declares both '{}' and '{}'", first, name),
            ));
        } else {
            verb = Some((name.to_string(), value.clone()));
        }
    }

    let (verb, params) = verb.ok_or_else(|| RuleLoadError::malformed(field_path, source, "entry has no verb"))?;
    Ok((verb, params, extra))
}

fn is_rule_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with("osi_") && (name.ends_with(".yml") || name.ends_with(".yaml"))
}

/// Convenience: load a directory into a fresh tree
pub fn load_rules_dir(dir: impl AsRef<Path>, catalog: &dyn VerbCatalog) -> RuleLoadResult<RuleTree> {
    let mut loader = RuleLoader::new(catalog);
    loader.load_dir(dir)?;
    Ok(loader.finish())
}
