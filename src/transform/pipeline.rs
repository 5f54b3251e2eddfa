//! Composition of transformations
//!
//! A [`Pipeline`] applies its steps left to right, each to the tree produced
//! by the previous one. Pipelines can be written as JSON scripts:
//!
//! ```json
//! [
//!   {"op": "remove", "id": "notes"},
//!   {"op": "add", "parent": "header", "position": 0,
//!    "node": {"id": "vendor", "label": "Vendor", "category": "datapoint", "type": "string"}},
//!   {"op": "move", "id": "due_date", "parent": "header"},
//!   {"op": "substitute-options", "id": "currency",
//!    "options": [{"value": "eur", "label": "Euro"}]}
//! ]
//! ```

use serde_json::{Map, Value};

use super::error::{TransformError, TransformResult};
use super::ops::{TransformOutcome, Transformation};
use super::options::options_from_json;
use crate::import::json::node_from_json;
use crate::models::SchemaTree;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    steps: Vec<Transformation>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step (builder style)
    pub fn then(mut self, step: Transformation) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: Transformation) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Transformation] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step; the first failure aborts with the step number attached
    pub fn apply(&self, tree: &SchemaTree) -> TransformResult<TransformOutcome> {
        let mut current = tree.clone();
        let mut changes = Vec::new();

        for (i, step) in self.steps.iter().enumerate() {
            let outcome = step.apply(&current).map_err(|e| TransformError::AtStep {
                step: i + 1,
                source: Box::new(e),
            })?;
            tracing::debug!("Step {} ({}) applied", i + 1, step.name());
            current = outcome.tree;
            changes.extend(outcome.changes);
        }

        Ok(TransformOutcome {
            tree: current,
            changes,
        })
    }

    /// Parse a JSON script: an array of step objects
    pub fn from_json(value: &Value) -> TransformResult<Self> {
        let Value::Array(items) = value else {
            return Err(TransformError::InvalidScript {
                step: 0,
                reason: "expected an array of steps".to_string(),
            });
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_step(i + 1, item))
            .collect::<TransformResult<Vec<_>>>()
            .map(|steps| Self { steps })
    }

    /// Parse a JSON script from text
    pub fn from_json_str(content: &str) -> TransformResult<Self> {
        let value: Value = serde_json::from_str(content).map_err(|e| TransformError::InvalidScript {
            step: 0,
            reason: e.to_string(),
        })?;
        Self::from_json(&value)
    }
}

impl FromIterator<Transformation> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Transformation>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

fn parse_step(step: usize, item: &Value) -> TransformResult<Transformation> {
    let invalid = |reason: String| TransformError::InvalidScript { step, reason };
    let Value::Object(map) = item else {
        return Err(invalid("expected an object".to_string()));
    };

    let string = |key: &str| -> TransformResult<Option<String>> {
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(format!("'{}' must be a string", key))),
        }
    };
    let required = |key: &str| -> TransformResult<String> {
        string(key)?.ok_or_else(|| invalid(format!("missing '{}'", key)))
    };
    let position = || -> TransformResult<Option<usize>> {
        match map.get("position") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| invalid("'position' must be a non-negative integer".to_string())),
            Some(_) => Err(invalid("'position' must be a non-negative integer".to_string())),
        }
    };

    let op = required("op")?;
    let allowed: &[&str] = match op.as_str() {
        "substitute-options" => &["op", "id", "options"],
        "remove" => &["op", "id"],
        "add" => &["op", "parent", "node", "position"],
        "move" => &["op", "id", "parent", "position"],
        other => return Err(invalid(format!("unknown operation '{}'", other))),
    };
    check_keys(map, allowed).map_err(|key| invalid(format!("unexpected key '{}' for {}", key, op)))?;

    let step = match op.as_str() {
        "substitute-options" => Transformation::SubstituteOptions {
            target_id: required("id")?,
            options: options_from_json(
                map.get("options")
                    .ok_or_else(|| invalid("missing 'options'".to_string()))?,
            )?,
        },
        "remove" => Transformation::Remove {
            target_id: required("id")?,
        },
        "add" => Transformation::Add {
            parent_id: string("parent")?,
            node: node_from_json(
                map.get("node")
                    .ok_or_else(|| invalid("missing 'node'".to_string()))?,
            )?,
            position: position()?,
        },
        _ => Transformation::Move {
            target_id: required("id")?,
            parent_id: string("parent")?,
            position: position()?,
        },
    };
    Ok(step)
}

fn check_keys<'a>(map: &'a Map<String, Value>, allowed: &[&str]) -> Result<(), &'a str> {
    match map.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(key.as_str()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, SchemaNode, SchemaOption};
    use serde_json::json;

    fn tree() -> SchemaTree {
        SchemaTree::new(vec![
            SchemaNode::section("header", "Header")
                .with_child(SchemaNode::datapoint("invoice_id", "Invoice ID", DataType::String))
                .with_child(SchemaNode::datapoint("notes", "Notes", DataType::String)),
        ])
        .unwrap()
    }

    #[test]
    fn test_steps_apply_left_to_right() {
        let pipeline = Pipeline::new()
            .then(Transformation::Add {
                parent_id: Some("header".to_string()),
                node: SchemaNode::enum_datapoint("currency", "Currency", Vec::new()),
                position: None,
            })
            .then(Transformation::SubstituteOptions {
                target_id: "currency".to_string(),
                options: vec![SchemaOption::new("eur", "Euro")],
            })
            .then(Transformation::Remove {
                target_id: "notes".to_string(),
            });

        let outcome = pipeline.apply(&tree()).unwrap();
        let ids: Vec<&str> = outcome.tree.roots()[0]
            .children
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["invoice_id", "currency"]);
        assert_eq!(outcome.changes.len(), 3);
    }

    #[test]
    fn test_failure_reports_step() {
        let pipeline: Pipeline = vec![
            Transformation::Remove {
                target_id: "notes".to_string(),
            },
            Transformation::Remove {
                target_id: "notes".to_string(),
            },
        ]
        .into_iter()
        .collect();

        let err = pipeline.apply(&tree()).unwrap_err();
        assert!(matches!(err, TransformError::AtStep { step: 2, .. }));
        assert_eq!(
            err.root_cause(),
            &TransformError::NodeNotFound {
                id: "notes".to_string()
            }
        );
    }

    #[test]
    fn test_parse_script() {
        let script = json!([
            {"op": "remove", "id": "notes"},
            {"op": "add", "parent": "header", "position": 0,
             "node": {"id": "vendor", "label": "Vendor", "category": "datapoint", "type": "string"}},
            {"op": "move", "id": "invoice_id", "position": 0, "parent": "header"}
        ]);
        let pipeline = Pipeline::from_json(&script).unwrap();
        assert_eq!(pipeline.len(), 3);

        let outcome = pipeline.apply(&tree()).unwrap();
        let ids: Vec<&str> = outcome.tree.roots()[0]
            .children
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["invoice_id", "vendor"]);
    }

    #[test]
    fn test_script_errors() {
        assert!(matches!(
            Pipeline::from_json(&json!([{"op": "rename", "id": "x"}])),
            Err(TransformError::InvalidScript { step: 1, .. })
        ));
        assert!(matches!(
            Pipeline::from_json(&json!([{"op": "remove", "id": "x"}, {"op": "remove", "target": "x"}])),
            Err(TransformError::InvalidScript { step: 2, .. })
        ));
        assert!(matches!(
            Pipeline::from_json(&json!({"op": "remove"})),
            Err(TransformError::InvalidScript { step: 0, .. })
        ));
    }
}
