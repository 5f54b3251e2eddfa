//! Schema codec tests

use docschema_sdk::convert::{Cell, Table, table_to_tree, tree_to_table};
use docschema_sdk::export::{tree_to_json, write_schema_file, write_xlsx};
use docschema_sdk::import::{json_to_tree, read_schema_file, read_xlsx_bytes};
use docschema_sdk::{Category, DataType, SchemaNode, SchemaOption, SchemaTree};
use serde_json::json;

fn invoice_schema() -> SchemaTree {
    SchemaTree::new(vec![
        SchemaNode::section("basic_info", "Basic information")
            .with_child(SchemaNode::datapoint("invoice_id", "Invoice number", DataType::String))
            .with_child(SchemaNode::datapoint("date_issue", "Issue date", DataType::Date))
            .with_child(SchemaNode::enum_datapoint(
                "currency",
                "Currency",
                vec![
                    SchemaOption::new("eur", "Euro"),
                    SchemaOption::new("usd", "US Dollar"),
                ],
            )),
        SchemaNode::section("line_items_section", "Line items").with_child(
            SchemaNode::multivalue("line_items", "Line items").with_child(
                SchemaNode::tuple("line_item", "Line item")
                    .with_child(SchemaNode::datapoint("item_desc", "Description", DataType::String))
                    .with_child(SchemaNode::datapoint("item_amount", "Amount", DataType::Number)),
            ),
        ),
    ])
    .unwrap()
}

mod json_codec_tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let tree = invoice_schema();
        let value = tree_to_json(&tree);
        assert_eq!(json_to_tree(&value).unwrap(), tree);
    }

    #[test]
    fn test_json_preserves_child_and_option_order() {
        let value = json!([{
            "id": "s",
            "category": "section",
            "label": "S",
            "children": [
                {"id": "z", "category": "datapoint", "label": "Z", "type": "string"},
                {"id": "a", "category": "enum", "label": "A", "type": "enum"}
            ]
        }]);
        // "enum" is not a category
        assert!(json_to_tree(&value).is_err());

        let value = json!([{
            "id": "s",
            "category": "section",
            "label": "S",
            "children": [
                {"id": "z", "category": "datapoint", "label": "Z", "type": "string"},
                {"id": "a", "category": "datapoint", "label": "A", "type": "enum",
                 "options": [{"value": "2", "label": "Two"}, {"value": "1", "label": "One"}]}
            ]
        }]);
        let tree = json_to_tree(&value).unwrap();
        let ids: Vec<&str> = tree.roots()[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
        let values: Vec<&str> = tree
            .get("a")
            .unwrap()
            .options()
            .iter()
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(values, vec!["2", "1"]);
        assert_eq!(tree_to_json(&tree), value);
    }

    #[test]
    fn test_duplicate_id_rejected_with_id() {
        let value = json!([
            {"id": "dup", "category": "section", "label": "A", "children": []},
            {"id": "dup", "category": "section", "label": "B", "children": []}
        ]);
        let err = json_to_tree(&value).unwrap_err();
        assert_eq!(err.node_id(), "dup");
    }
}

mod tabular_codec_tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn rows_table(rows: Vec<Vec<Cell>>) -> Table {
        Table {
            version: "1".to_string(),
            header: ["path_1", "path_2", "id", "category", "label", "type"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows,
        }
    }

    #[test]
    fn test_table_round_trip() {
        let tree = invoice_schema();
        assert_eq!(table_to_tree(&tree_to_table(&tree)).unwrap(), tree);
    }

    #[test]
    fn test_xlsx_round_trip() {
        let tree = invoice_schema();
        let bytes = write_xlsx(&tree).unwrap();
        assert_eq!(read_xlsx_bytes(&bytes).unwrap(), tree);
    }

    #[test]
    fn test_xlsx_keeps_unlabelled_nodes_and_extra_attributes() {
        let value = json!([{
            "category": "section",
            "id": "totals",
            "children": [{
                "category": "datapoint",
                "id": "amount",
                "type": "number",
                "constraints": {"required": false, "length": {"min": 1, "max": 12}},
                "ui_configuration": {"type": "captured", "edit": "enabled"}
            }]
        }]);
        let tree = json_to_tree(&value).unwrap();
        let bytes = write_xlsx(&tree).unwrap();
        let read_back = read_xlsx_bytes(&bytes).unwrap();
        assert_eq!(read_back, tree);
        assert_eq!(tree_to_json(&read_back), value);
    }

    #[test]
    fn test_rows_rebuild_children_in_file_order() {
        let section = vec![text("root"), Cell::Empty, text("root"), text("section"), text("Root"), Cell::Empty];
        let field_a = vec![
            text("root"),
            text("field_a"),
            text("field_a"),
            text("datapoint"),
            text("A"),
            text("string"),
        ];
        let field_b = vec![
            text("root"),
            text("field_b"),
            text("field_b"),
            text("datapoint"),
            text("B"),
            text("string"),
        ];

        let tree =
            table_to_tree(&rows_table(vec![section.clone(), field_a.clone(), field_b.clone()]))
                .unwrap();
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.roots()[0].category(), Category::Section);
        let ids: Vec<&str> = tree.roots()[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["field_a", "field_b"]);

        let tree = table_to_tree(&rows_table(vec![section, field_b, field_a])).unwrap();
        let ids: Vec<&str> = tree.roots()[0].children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["field_b", "field_a"]);
    }

    #[test]
    fn test_child_before_parent_is_rejected() {
        let table = rows_table(vec![
            vec![
                text("root"),
                text("field_a"),
                text("field_a"),
                text("datapoint"),
                text("A"),
                text("string"),
            ],
            vec![text("root"), Cell::Empty, text("root"), text("section"), text("Root"), Cell::Empty],
        ]);
        assert!(table_to_tree(&table).is_err());
    }
}

mod file_tests {
    use super::*;

    #[test]
    fn test_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let tree = invoice_schema();

        for name in ["schema.json", "schema.yaml", "schema.xlsx"] {
            let path = dir.path().join(name);
            write_schema_file(&tree, &path).unwrap();
            assert_eq!(read_schema_file(&path).unwrap(), tree, "{}", name);
        }
    }

    #[test]
    fn test_failed_read_leaves_existing_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, "[{\"id\": \"x\"").unwrap();

        assert!(read_schema_file(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"id\": \"x\"");
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.txt");
        std::fs::write(&path, "[]").unwrap();
        assert!(read_schema_file(&path).is_err());
    }
}
