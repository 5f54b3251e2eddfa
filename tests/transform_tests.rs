//! Transformation engine tests

use docschema_sdk::import::json_to_tree;
use docschema_sdk::transform::{Change, Pipeline, TransformError, Transformation, read_options_file};
use docschema_sdk::{DataType, SchemaNode, SchemaOption, SchemaTree};
use docschema_sdk::export::tree_to_json;
use serde_json::json;

fn schema() -> SchemaTree {
    json_to_tree(&json!([
        {
            "id": "basic_info",
            "category": "section",
            "label": "Basic information",
            "children": [
                {"id": "invoice_id", "category": "datapoint", "type": "string", "options": []},
                {"id": "vendor", "category": "datapoint", "type": "string", "label": "Vendor"}
            ]
        },
        {
            "id": "totals",
            "category": "section",
            "label": "Totals",
            "children": [
                {"id": "amount_total", "category": "datapoint", "type": "number", "label": "Total"}
            ]
        }
    ]))
    .unwrap()
}

mod substitute_options_tests {
    use super::*;

    #[test]
    fn test_options_replaced_on_string_datapoint_with_options() {
        let tree = schema();
        let outcome = Transformation::SubstituteOptions {
            target_id: "invoice_id".to_string(),
            options: vec![SchemaOption::new("1", "One")],
        }
        .apply(&tree)
        .unwrap();

        assert_eq!(
            outcome.tree.get("invoice_id").unwrap().options(),
            &[SchemaOption::new("1", "One")]
        );
        assert_eq!(outcome.tree.len(), tree.len());
        assert_eq!(outcome.tree.get("vendor"), tree.get("vendor"));
        assert_eq!(outcome.tree.get("totals"), tree.get("totals"));
        // input tree is untouched
        assert!(tree.get("invoice_id").unwrap().options().is_empty());
    }

    #[test]
    fn test_unlabelled_datapoint_gets_options() {
        let tree =
            json_to_tree(&json!({"id":"invoice_id","category":"datapoint","type":"string","options":[]}))
                .unwrap();
        let outcome = Transformation::SubstituteOptions {
            target_id: "invoice_id".to_string(),
            options: vec![SchemaOption::new("1", "One"), SchemaOption::new("2", "Two")],
        }
        .apply(&tree)
        .unwrap();

        assert_eq!(
            tree_to_json(&outcome.tree),
            json!([{
                "category": "datapoint",
                "id": "invoice_id",
                "type": "string",
                "options": [{"value": "1", "label": "One"}, {"value": "2", "label": "Two"}]
            }])
        );
    }

    #[test]
    fn test_datapoint_without_options_is_unsupported() {
        let err = Transformation::SubstituteOptions {
            target_id: "vendor".to_string(),
            options: vec![SchemaOption::new("1", "One")],
        }
        .apply(&schema())
        .unwrap_err();
        assert!(matches!(err, TransformError::UnsupportedNodeKind { ref id, .. } if id == "vendor"));
    }

    #[test]
    fn test_options_from_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendors.csv");
        std::fs::write(&path, "value,label\nacme,ACME Corp\nglobex,Globex\n").unwrap();

        let options = read_options_file(&path).unwrap();
        let outcome = Transformation::SubstituteOptions {
            target_id: "invoice_id".to_string(),
            options,
        }
        .apply(&schema())
        .unwrap();
        let values: Vec<&str> = outcome
            .tree
            .get("invoice_id")
            .unwrap()
            .options()
            .iter()
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(values, vec!["acme", "globex"]);
    }
}

mod structural_tests {
    use super::*;

    #[test]
    fn test_remove_then_remove_again() {
        let step = Transformation::Remove {
            target_id: "basic_info".to_string(),
        };
        let outcome = step.apply(&schema()).unwrap();
        assert!(!outcome.tree.contains("basic_info"));
        assert!(!outcome.tree.contains("invoice_id"));
        assert!(matches!(
            &outcome.changes[0],
            Change::Removed { removed_ids, .. } if removed_ids.len() == 3
        ));

        let err = step.apply(&outcome.tree).unwrap_err();
        assert_eq!(
            err,
            TransformError::NodeNotFound {
                id: "basic_info".to_string()
            }
        );
    }

    #[test]
    fn test_add_with_id_used_elsewhere_fails() {
        let err = Transformation::Add {
            parent_id: Some("basic_info".to_string()),
            node: SchemaNode::datapoint("amount_total", "Again", DataType::Number),
            position: None,
        }
        .apply(&schema())
        .unwrap_err();
        assert_eq!(
            err,
            TransformError::DuplicateId {
                id: "amount_total".to_string()
            }
        );
    }

    #[test]
    fn test_move_keeps_other_children_in_order() {
        let outcome = Transformation::Move {
            target_id: "amount_total".to_string(),
            parent_id: Some("basic_info".to_string()),
            position: Some(1),
        }
        .apply(&schema())
        .unwrap();

        let ids: Vec<&str> = outcome.tree.roots()[0]
            .children
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["invoice_id", "amount_total", "vendor"]);
        assert!(outcome.tree.roots()[1].children.is_empty());
    }
}

mod pipeline_tests {
    use super::*;

    #[test]
    fn test_failing_step_leaves_input_unchanged() {
        let tree = schema();
        let before = tree.clone();
        let pipeline = Pipeline::new()
            .then(Transformation::Remove {
                target_id: "vendor".to_string(),
            })
            .then(Transformation::Remove {
                target_id: "vendor".to_string(),
            });

        let err = pipeline.apply(&tree).unwrap_err();
        assert!(matches!(err, TransformError::AtStep { step: 2, .. }));
        assert_eq!(
            err.root_cause(),
            &TransformError::NodeNotFound {
                id: "vendor".to_string()
            }
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn test_script_applies_steps_in_order() {
        let script = r#"[
            {"op": "add", "parent": "totals", "node": {"id": "tax", "category": "datapoint", "type": "number", "label": "Tax"}},
            {"op": "move", "id": "tax", "parent": "totals", "position": 0},
            {"op": "remove", "id": "vendor"}
        ]"#;
        let outcome = Pipeline::from_json_str(script).unwrap().apply(&schema()).unwrap();

        assert_eq!(outcome.changes.len(), 3);
        let totals: Vec<&str> = outcome
            .tree
            .get("totals")
            .unwrap()
            .children
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(totals, vec!["tax", "amount_total"]);
        assert!(!outcome.tree.contains("vendor"));
    }
}
