//! Doxygen XML rule source
//!
//! Rules can live in the `.proto` documentation itself:
//!
//! ```text
//! // \rules
//! // - is_globally_unique
//! // \endrules
//! optional Identifier id = 1;
//! ```
//!
//! After a Doxygen run, each such block becomes a `<verbatim>` whose first
//! line is `rules`, nested in the `<memberdef kind="variable">` of the field,
//! inside the `<compounddef>` of the message (`osi3::MovingObject`).

use crate::error::{RuleLoadError, RuleLoadResult};
use crate::loader::RuleLoader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_yaml::Value as YamlValue;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One `rules` block found in the XML
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBlock {
    /// Message type path without package
    pub type_path: Vec<String>,
    pub field_name: String,
    /// YAML list following the `rules` marker line
    pub yaml: String,
}

/// Load every rule block of a Doxygen XML file, or of every `.xml` file in
/// a directory, into `loader`. Returns the number of blocks applied.
pub fn load_doxygen(loader: &mut RuleLoader<'_>, path: impl AsRef<Path>) -> RuleLoadResult<usize> {
    let path = path.as_ref();
    let files = if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|source| RuleLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("xml"))
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut applied = 0;
    for file in &files {
        let xml = std::fs::read_to_string(file).map_err(|source| RuleLoadError::Io {
            path: file.clone(),
            source,
        })?;
        for block in extract_rule_blocks(&xml, file)? {
            let entries: YamlValue = serde_yaml::from_str(&block.yaml).map_err(|source| RuleLoadError::Yaml {
                path: file.clone(),
                source,
            })?;
            loader.load_field_entries(&block.type_path, &block.field_name, &entries, file)?;
            applied += 1;
        }
    }

    debug!("Applied {} Doxygen rule blocks from {}", applied, path.display());
    Ok(applied)
}

/// Scan one XML document for rule blocks.
pub fn extract_rule_blocks(xml: &str, source: &Path) -> RuleLoadResult<Vec<RuleBlock>> {
    let mut reader = Reader::from_str(xml);
    let mut blocks = Vec::new();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut compound: Option<Vec<String>> = None;
    let mut in_message_compound = false;
    let mut compound_name = String::new();
    let mut in_variable = false;
    let mut member_name = String::new();
    let mut verbatim: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|e| RuleLoadError::Xml {
            path: source.to_path_buf(),
            reason: format!("at byte {}: {}", reader.buffer_position(), e),
        })?;

        match event {
            Event::Start(start) => {
                let name = start.name().as_ref().to_vec();
                match name.as_slice() {
                    b"compounddef" => {
                        let kind = attribute(&start, "kind", source)?;
                        in_message_compound = matches!(kind.as_deref(), Some("struct") | Some("class"));
                        compound = None;
                        compound_name.clear();
                    }
                    b"memberdef" => {
                        in_variable = attribute(&start, "kind", source)?.as_deref() == Some("variable");
                        member_name.clear();
                    }
                    b"verbatim" if in_variable => verbatim = Some(String::new()),
                    _ => {}
                }
                stack.push(name);
            }
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                match name.as_slice() {
                    b"compoundname" if in_message_compound => {
                        compound = type_path_from_compound(compound_name.trim());
                    }
                    b"memberdef" => in_variable = false,
                    b"compounddef" => {
                        in_message_compound = false;
                        compound = None;
                    }
                    b"verbatim" => {
                        if let (Some(text), Some(type_path)) = (verbatim.take(), compound.as_ref()) {
                            if let Some(yaml) = rules_body(&text) {
                                if member_name.is_empty() {
                                    warn!("{}: rules block outside a named field in {}", source.display(), type_path.join("."));
                                } else {
                                    blocks.push(RuleBlock {
                                        type_path: type_path.clone(),
                                        field_name: member_name.trim().to_string(),
                                        yaml,
                                    });
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| RuleLoadError::Xml {
                    path: source.to_path_buf(),
                    reason: e.to_string(),
                })?;
                append_text(&stack, &text, &mut compound_name, &mut member_name, &mut verbatim, in_variable);
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                append_text(&stack, &text, &mut compound_name, &mut member_name, &mut verbatim, in_variable);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(blocks)
}

fn append_text(
    stack: &[Vec<u8>],
    text: &str,
    compound_name: &mut String,
    member_name: &mut String,
    verbatim: &mut Option<String>,
    in_variable: bool,
) {
    match stack.last().map(Vec::as_slice) {
        Some(b"compoundname") => compound_name.push_str(text),
        Some(b"name") if in_variable && stack.len() >= 2 && stack[stack.len() - 2] == b"memberdef" => {
            member_name.push_str(text)
        }
        _ => {
            if let Some(buffer) = verbatim.as_mut() {
                buffer.push_str(text);
            }
        }
    }
}

fn attribute(start: &BytesStart<'_>, key: &str, source: &Path) -> RuleLoadResult<Option<String>> {
    let attr = start.try_get_attribute(key).map_err(|e| RuleLoadError::Xml {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|e| RuleLoadError::Xml {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })
    })
    .transpose()
}

/// `osi3::MovingObject::VehicleAttributes` → `[MovingObject, VehicleAttributes]`
fn type_path_from_compound(name: &str) -> Option<Vec<String>> {
    let mut parts = name.split("::");
    parts.next()?;
    let path: Vec<String> = parts.map(str::to_string).collect();
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Lines after a leading `rules` marker line
fn rules_body(text: &str) -> Option<String> {
    let text = text.trim_start_matches(['\n', '\r']);
    let mut lines = text.lines();
    let marker = lines.next()?;
    if marker.trim() != "rules" {
        return None;
    }
    Some(lines.collect::<Vec<_>>().join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verbs::StaticCatalog;

    const XML: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='no'?>
<doxygen version="1.9.1">
  <compounddef id="structosi3_1_1MovingObject" kind="struct" language="C++">
    <compoundname>osi3::MovingObject</compoundname>
    <sectiondef kind="public-attrib">
      <memberdef kind="variable" id="m1">
        <type><ref refid="x">Identifier</ref></type>
        <name>id</name>
        <detaileddescription>
          <para>The ID of the object.</para>
          <para><verbatim>rules
- is_globally_unique
- is_set
</verbatim></para>
        </detaileddescription>
      </memberdef>
      <memberdef kind="variable" id="m2">
        <name>model_reference</name>
        <detaileddescription>
          <para><verbatim>just an example, not rules</verbatim></para>
        </detaileddescription>
      </memberdef>
    </sectiondef>
  </compounddef>
  <compounddef id="namespaceosi3" kind="namespace">
    <compoundname>osi3</compoundname>
  </compounddef>
  <compounddef id="structosi3_1_1MovingObject_1_1VehicleClassification" kind="struct">
    <compoundname>osi3::MovingObject::VehicleClassification</compoundname>
    <sectiondef kind="public-attrib">
      <memberdef kind="variable" id="m3">
        <name>type</name>
        <detaileddescription><para><verbatim>rules
- is_greater_than_or_equal_to: 0
  severity: warn
</verbatim></para></detaileddescription>
      </memberdef>
    </sectiondef>
  </compounddef>
</doxygen>
"#;

    #[test]
    fn test_extract_rule_blocks() {
        let blocks = extract_rule_blocks(XML, Path::new("index.xml")).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].type_path, vec!["MovingObject"]);
        assert_eq!(blocks[0].field_name, "id");
        assert!(blocks[0].yaml.contains("- is_globally_unique"));
        assert_eq!(blocks[1].type_path, vec!["MovingObject", "VehicleClassification"]);
        assert_eq!(blocks[1].field_name, "type");
    }

    #[test]
    fn test_load_doxygen_into_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("structosi3.xml"), XML).unwrap();

        let catalog = StaticCatalog(&["is_globally_unique", "is_set", "is_greater_than_or_equal_to"]);
        let mut loader = RuleLoader::new(&catalog);
        assert_eq!(load_doxygen(&mut loader, dir.path()).unwrap(), 2);
        let tree = loader.finish();

        let moving = tree.get_type(&["MovingObject"][..]).unwrap();
        assert_eq!(tree.field(moving, "id").unwrap().rules.len(), 2);

        let vc = tree.get_type(&["MovingObject", "VehicleClassification"][..]).unwrap();
        let rule = &tree.field(vc, "type").unwrap().rules[0];
        assert_eq!(rule.severity, types::Severity::Warn);
    }

    #[test]
    fn test_rules_body() {
        assert_eq!(rules_body("rules\n- is_set\n").as_deref(), Some("- is_set"));
        assert_eq!(rules_body("\nrules\n- a\n- b").as_deref(), Some("- a\n- b"));
        assert_eq!(rules_body("not rules\n- is_set"), None);
    }

    #[test]
    fn test_broken_xml() {
        let err = extract_rule_blocks("<doxygen><compounddef></doxygen>", Path::new("x.xml")).unwrap_err();
        assert!(matches!(err, RuleLoadError::Xml { .. }));
    }
}
