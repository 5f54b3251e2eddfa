//! Sideloading of related objects
//!
//! A list endpoint can embed related collections in its envelope
//! (`?sideload=queues,users`). After every page has been merged, each result
//! object's reference to a related object is replaced by the object itself.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::error::{ApiError, ApiResult};
use super::query::Query;

const SIDELOAD_PARAM: &str = "sideload";
const CONTENT_SCHEMA_PARAM: &str = "content.schema_id";

#[derive(Debug, Clone, PartialEq, Eq)]
enum SideloadKind {
    Plain,
    /// Annotation content restricted to the given schema ids
    Content { schema_ids: Vec<String> },
}

/// A related collection to embed in a list response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sideload {
    plural: String,
    singular: String,
    kind: SideloadKind,
}

impl Sideload {
    /// Sideload whose singular key is `plural` without its trailing `s`
    pub fn new(plural: impl Into<String>) -> Self {
        let plural = plural.into();
        let singular = plural.trim_end_matches('s').to_string();
        Self {
            plural,
            singular,
            kind: SideloadKind::Plain,
        }
    }

    pub fn with_singular(plural: impl Into<String>, singular: impl Into<String>) -> Self {
        Self {
            plural: plural.into(),
            singular: singular.into(),
            kind: SideloadKind::Plain,
        }
    }

    /// Annotation content limited to datapoints with the given schema ids
    ///
    /// Without schema ids the server ignores content sideloading, so the
    /// query is left untouched.
    pub fn content<I, S>(schema_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            plural: "content".to_string(),
            singular: "content".to_string(),
            kind: SideloadKind::Content {
                schema_ids: schema_ids.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn singular(&self) -> &str {
        &self.singular
    }

    /// Register this sideload in the query parameters
    pub fn setup_query(&self, query: &mut Query) {
        if let SideloadKind::Content { schema_ids } = &self.kind {
            if schema_ids.is_empty() {
                return;
            }
            merge_list_param(query, CONTENT_SCHEMA_PARAM, schema_ids.iter().map(String::as_str));
        }
        merge_list_param(query, SIDELOAD_PARAM, std::iter::once(self.plural.as_str()));
    }

    /// Index the sideloaded objects for injection
    ///
    /// Plain sideloads map each object's `url` to the object. Content maps the
    /// parent content URL to the list of datapoints below it.
    fn mapping(&self, objects: &[Value]) -> HashMap<String, Value> {
        let mut mapping = HashMap::new();
        for object in objects {
            let Some(url) = object.get("url").and_then(Value::as_str) else {
                continue;
            };
            match self.kind {
                SideloadKind::Plain => {
                    mapping.insert(url.to_string(), object.clone());
                }
                SideloadKind::Content { .. } => {
                    let parent = url.rsplit_once('/').map_or(url, |(parent, _)| parent);
                    let entry = mapping
                        .entry(parent.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(items) = entry {
                        items.push(object.clone());
                    }
                }
            }
        }
        mapping
    }

    /// Replace references in one result object
    fn inject(&self, object: &mut Value, mapping: &HashMap<String, Value>) {
        let Value::Object(fields) = object else {
            return;
        };

        if let Some(reference) = fields.get(&self.singular) {
            let resolved = reference
                .as_str()
                .and_then(|url| mapping.get(url))
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            fields.insert(self.singular.clone(), resolved);
        } else if let Some(Value::Array(references)) = fields.get(&self.plural) {
            let resolved = references
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|url| mapping.get(url).cloned())
                .collect();
            fields.insert(self.plural.clone(), Value::Array(resolved));
        }
    }
}

impl From<&str> for Sideload {
    fn from(plural: &str) -> Self {
        Sideload::new(plural)
    }
}

/// Add `sideloads` to a query that does not already name its own
pub fn setup_sideloads(query: &mut Query, sideloads: &[Sideload]) -> ApiResult<()> {
    if sideloads.is_empty() {
        return Ok(());
    }
    if query.contains(SIDELOAD_PARAM) {
        return Err(ApiError::InvalidArgument(
            "sideloading cannot be specified both in the query and as sideloads".to_string(),
        ));
    }
    for sideload in sideloads {
        sideload.setup_query(query);
    }
    Ok(())
}

/// Inject sideloaded collections into every object of `results`
///
/// `collections` holds the merged envelope keys (`queues`, `users`, ...)
/// next to the results.
pub fn resolve_sideloads(
    results: &mut [Value],
    collections: &Map<String, Value>,
    sideloads: &[Sideload],
) {
    for sideload in sideloads {
        let objects = match collections.get(&sideload.plural) {
            Some(Value::Array(objects)) => objects.as_slice(),
            _ => &[],
        };
        let mapping = sideload.mapping(objects);
        for object in results.iter_mut() {
            sideload.inject(object, &mapping);
        }
    }
}

fn merge_list_param<'a>(query: &mut Query, key: &str, additions: impl Iterator<Item = &'a str>) {
    let mut items: Vec<String> = query
        .get(key)
        .unwrap_or_default()
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    for addition in additions {
        if !items.iter().any(|item| item == addition) {
            items.push(addition.to_string());
        }
    }
    query.set(key, items.join(","));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_singular_defaults() {
        let sideload = Sideload::new("queues");
        assert_eq!(sideload.singular(), "queue");
        assert_eq!(Sideload::from("content").singular(), "content");
        assert_eq!(Sideload::with_singular("inboxes", "inbox").singular(), "inbox");
    }

    #[test]
    fn test_query_setup() {
        let mut query = Query::new().with("status", "to_review");
        setup_sideloads(
            &mut query,
            &[
                Sideload::new("modifiers"),
                Sideload::new("documents"),
                Sideload::content(["invoice_id", "date_issue"]),
            ],
        )
        .unwrap();
        assert_eq!(
            query.encode(),
            "status=to_review&sideload=modifiers%2Cdocuments%2Ccontent&content.schema_id=invoice_id%2Cdate_issue"
        );
    }

    #[test]
    fn test_empty_content_is_ignored() {
        let mut query = Query::new();
        setup_sideloads(&mut query, &[Sideload::content(Vec::<String>::new())]).unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_sideload_conflict() {
        let mut query = Query::new().with("sideload", "queues");
        assert!(matches!(
            setup_sideloads(&mut query, &[Sideload::new("users")]),
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_resolve() {
        let mut results = vec![
            json!({"url": "a/1", "queue": "q/1", "users": ["u/1", "u/9", "u/2"]}),
            json!({"url": "a/2", "queue": "q/404", "users": []}),
        ];
        let collections = json!({
            "queues": [{"url": "q/1", "name": "Inbox"}],
            "users": [{"url": "u/1"}, {"url": "u/2"}]
        });
        resolve_sideloads(
            &mut results,
            collections.as_object().unwrap(),
            &[Sideload::new("queues"), Sideload::new("users")],
        );

        assert_eq!(results[0]["queue"], json!({"url": "q/1", "name": "Inbox"}));
        assert_eq!(results[0]["users"], json!([{"url": "u/1"}, {"url": "u/2"}]));
        assert_eq!(results[1]["queue"], json!({}));
    }

    #[test]
    fn test_resolve_content() {
        let mut results = vec![json!({"url": "a/1", "content": "a/1/content"})];
        let collections = json!({
            "content": [
                {"url": "a/1/content/10", "schema_id": "invoice_id"},
                {"url": "a/1/content/11", "schema_id": "date_issue"},
                {"url": "a/2/content/12", "schema_id": "invoice_id"}
            ]
        });
        resolve_sideloads(
            &mut results,
            collections.as_object().unwrap(),
            &[Sideload::content(["invoice_id"])],
        );
        let content = results[0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["schema_id"], "date_issue");
    }
}
