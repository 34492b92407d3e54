// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Workflow definitions.
//!
//! Two formats are accepted. The task-list format has one processor call per
//! line:
//!
//! ```text
//! # binarize, then segment
//! cis-ocropy-binarize -I OCR-D-IMG -O OCR-D-BIN
//! tesserocr-segment-region -I OCR-D-BIN -O OCR-D-SEG \
//!     -P overwrite_regions true -P padding 4
//! ```
//!
//! `-I`/`-O` take comma-separated file groups, `-P key value` sets one
//! parameter (the value is read as JSON when it parses, as a string otherwise)
//! and `-p` merges a JSON object, given inline or as a file path. Processor
//! names without the `ocrd-` prefix get it added.
//!
//! The YAML format spells the same out and allows a per-step `page_wise`
//! override:
//!
//! ```yaml
//! steps:
//!   - processor: ocrd-cis-ocropy-binarize
//!     input: [OCR-D-IMG]
//!     output: [OCR-D-BIN]
//!     page_wise: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::WorkflowError;

const PROCESSOR_PREFIX: &str = "ocrd-";

/// One processor call of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowStep {
    #[serde(alias = "processor")]
    pub processor_name: String,
    #[serde(alias = "input")]
    pub input_file_groups: Vec<String>,
    #[serde(default, alias = "output")]
    pub output_file_groups: Vec<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Overrides the workflow-wide page-wise flag for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_wise: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDefinition {
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    /// Parse either format; a document whose first statement is `steps:` is YAML.
    pub fn parse(text: &str) -> Result<Self, WorkflowError> {
        let first = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'));

        let definition = match first {
            Some(line) if line.starts_with("steps:") => Self::parse_yaml(text)?,
            _ => Self::parse_task_list(text)?,
        };
        if definition.steps.is_empty() {
            return Err(WorkflowError::Empty);
        }
        Ok(definition)
    }

    pub fn parse_yaml(text: &str) -> Result<Self, WorkflowError> {
        let mut definition: WorkflowDefinition =
            serde_yaml::from_str(text).map_err(|e| WorkflowError::Definition {
                line: e.location().map(|l| l.line()).unwrap_or(0),
                reason: e.to_string(),
            })?;
        for (index, step) in definition.steps.iter_mut().enumerate() {
            step.processor_name = normalize_processor(&step.processor_name);
            if step.input_file_groups.is_empty() {
                return Err(WorkflowError::Definition {
                    line: 0,
                    reason: format!("step {} has no input file group", index + 1),
                });
            }
        }
        Ok(definition)
    }

    pub fn parse_task_list(text: &str) -> Result<Self, WorkflowError> {
        let mut steps = Vec::new();
        for (line, task) in logical_lines(text) {
            steps.push(parse_task(line, &task)?);
        }
        Ok(Self { steps })
    }

    /// Check every step names a processor `is_known` accepts.
    pub fn validate(&self, is_known: impl Fn(&str) -> bool) -> Result<(), WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Empty);
        }
        for (index, step) in self.steps.iter().enumerate() {
            if !is_known(&step.processor_name) {
                return Err(WorkflowError::UnknownProcessor {
                    step: index + 1,
                    processor: step.processor_name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn normalize_processor(name: &str) -> String {
    if name.starts_with(PROCESSOR_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", PROCESSOR_PREFIX, name)
    }
}

/// Join `\`-continued lines and drop blanks and comments. Yields the 1-based
/// line number each task starts on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut tasks = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if current.is_empty() && (line.is_empty() || line.starts_with('#')) {
            continue;
        }
        if current.is_empty() {
            start = index + 1;
        }
        match line.strip_suffix('\\') {
            Some(head) => {
                current.push_str(head);
                current.push(' ');
            }
            None => {
                current.push_str(line);
                tasks.push((start, std::mem::take(&mut current)));
            }
        }
    }
    if !current.trim().is_empty() {
        tasks.push((start, current));
    }
    tasks
}

fn parse_task(line: usize, task: &str) -> Result<WorkflowStep, WorkflowError> {
    let error = |reason: String| WorkflowError::Definition { line, reason };
    let words = split_words(task).map_err(error)?;
    let mut words = words.into_iter();

    let processor = words
        .next()
        .ok_or_else(|| error("empty task".to_string()))?;
    if processor.starts_with('-') {
        return Err(error(format!("expected a processor name, found '{}'", processor)));
    }

    let mut step = WorkflowStep {
        processor_name: normalize_processor(&processor),
        input_file_groups: Vec::new(),
        output_file_groups: Vec::new(),
        parameters: BTreeMap::new(),
        page_wise: None,
    };

    while let Some(flag) = words.next() {
        let mut value = |what: &str| {
            words
                .next()
                .ok_or_else(|| error(format!("{} expects {}", flag, what)))
        };
        match flag.as_str() {
            "-I" => step.input_file_groups.extend(split_groups(&value("file groups")?)),
            "-O" => step.output_file_groups.extend(split_groups(&value("file groups")?)),
            "-P" => {
                let key = value("a key and a value")?;
                let raw = value("a key and a value")?;
                step.parameters.insert(key, parse_parameter_value(&raw));
            }
            "-p" => {
                let source = value("a JSON object or file")?;
                let parameters = read_parameters(&source).map_err(error)?;
                step.parameters.extend(parameters);
            }
            other => return Err(error(format!("unknown option '{}'", other))),
        }
    }

    if step.input_file_groups.is_empty() {
        return Err(error(format!(
            "{} needs at least one input file group (-I)",
            step.processor_name
        )));
    }
    Ok(step)
}

fn split_groups(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
}

fn parse_parameter_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn read_parameters(source: &str) -> Result<BTreeMap<String, serde_json::Value>, String> {
    let text = if source.trim_start().starts_with('{') {
        source.to_string()
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| format!("cannot read parameter file {}: {}", source, e))?
    };
    serde_json::from_str(&text).map_err(|e| format!("parameters must be a JSON object: {}", e))
}

/// Split like a POSIX shell would: whitespace separates words, quotes group,
/// backslash escapes outside single quotes.
fn split_words(input: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => word.push(c),
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(c) => word.push(c),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(c) = chars.next() {
                    word.push(c);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn parses_task_list_with_comments_and_continuations() {
        let text = r#"
# preprocessing
cis-ocropy-binarize -I OCR-D-IMG -O OCR-D-BIN

ocrd-tesserocr-segment-region -I OCR-D-BIN -O OCR-D-SEG \
    -P overwrite_regions true -P padding 4 -P model "Fraktur GT4HistOCR"
"#;
        let definition = WorkflowDefinition::parse(text).unwrap();
        assert_eq!(definition.steps.len(), 2);

        let first = &definition.steps[0];
        assert_eq!(first.processor_name, "ocrd-cis-ocropy-binarize");
        assert_eq!(first.input_file_groups, vec!["OCR-D-IMG"]);
        assert_eq!(first.output_file_groups, vec!["OCR-D-BIN"]);

        let second = &definition.steps[1];
        assert_eq!(second.processor_name, "ocrd-tesserocr-segment-region");
        assert_eq!(second.parameters["overwrite_regions"], json!(true));
        assert_eq!(second.parameters["padding"], json!(4));
        assert_eq!(second.parameters["model"], json!("Fraktur GT4HistOCR"));
    }

    #[test]
    fn multiple_groups_and_parameter_objects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dpi": 300, "level": "page"}}"#).unwrap();

        let text = format!(
            "dummy -I A,B -O C -p {} -p '{{\"level\": \"region\"}}'",
            file.path().display()
        );
        let definition = WorkflowDefinition::parse(&text).unwrap();
        let step = &definition.steps[0];
        assert_eq!(step.input_file_groups, vec!["A", "B"]);
        assert_eq!(step.parameters["dpi"], json!(300));
        assert_eq!(step.parameters["level"], json!("region"));
    }

    #[test]
    fn parses_yaml_with_page_wise_override() {
        let text = r#"
steps:
  - processor: cis-ocropy-binarize
    input: [OCR-D-IMG]
    output: [OCR-D-BIN]
    page_wise: true
  - processor_name: ocrd-dummy
    input_file_groups: [OCR-D-BIN]
    output_file_groups: [OCR-D-COPY]
    parameters: {copy_files: true}
"#;
        let definition = WorkflowDefinition::parse(text).unwrap();
        assert_eq!(definition.steps[0].processor_name, "ocrd-cis-ocropy-binarize");
        assert_eq!(definition.steps[0].page_wise, Some(true));
        assert_eq!(definition.steps[1].page_wise, None);
        assert_eq!(definition.steps[1].parameters["copy_files"], json!(true));
    }

    #[test]
    fn invalid_definitions_report_the_line() {
        struct TestCase {
            name: &'static str,
            text: &'static str,
            expected_line: usize,
        }

        let test_cases = vec![
            TestCase {
                name: "missing input group",
                text: "\n\nocrd-dummy -O OUT",
                expected_line: 3,
            },
            TestCase {
                name: "unknown option",
                text: "ocrd-dummy -I IN -O OUT\nocrd-dummy -I OUT -X nope",
                expected_line: 2,
            },
            TestCase {
                name: "dangling -P",
                text: "ocrd-dummy -I IN -P key",
                expected_line: 1,
            },
            TestCase {
                name: "unterminated quote",
                text: "ocrd-dummy -I IN -P key \"open",
                expected_line: 1,
            },
        ];

        for case in test_cases {
            match WorkflowDefinition::parse(case.text) {
                Err(WorkflowError::Definition { line, .. }) => {
                    assert_eq!(line, case.expected_line, "case '{}'", case.name)
                }
                other => panic!("case '{}': unexpected {:?}", case.name, other),
            }
        }
    }

    #[test]
    fn empty_definition_is_rejected() {
        assert_eq!(
            WorkflowDefinition::parse("# nothing here\n\n"),
            Err(WorkflowError::Empty)
        );
    }

    #[test]
    fn validate_names_unknown_processor_step() {
        let definition =
            WorkflowDefinition::parse("ocrd-a -I A -O X\nocrd-b -I X -O Y").unwrap();
        let err = definition.validate(|name| name == "ocrd-a").unwrap_err();
        assert_eq!(
            err,
            WorkflowError::UnknownProcessor {
                step: 2,
                processor: "ocrd-b".to_string()
            }
        );
        assert!(definition.validate(|_| true).is_ok());
    }

    #[test]
    fn shipped_sample_workflow_parses() {
        let text = std::fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/configs/workflow.txt"
        ))
        .unwrap();
        let definition = WorkflowDefinition::parse(&text).unwrap();
        let processors: Vec<&str> = definition
            .steps
            .iter()
            .map(|s| s.processor_name.as_str())
            .collect();
        assert_eq!(
            processors,
            vec!["ocrd-cis-ocropy-binarize", "ocrd-tesserocr-recognize"]
        );
        assert_eq!(definition.steps[1].parameters["model"], json!("eng"));
    }
}
