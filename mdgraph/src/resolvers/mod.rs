//! Query resolvers published with the schema.
//!
//! Invalid arguments are returned as [`MdGraphError::InvalidQuery`]. Store
//! failures are logged and answered with an empty list or `null`.

use crate::error::{MdGraphError, Result};
use crate::query::{translate, Filter, MultiAxisQuery, Pagination, QuerySpec, Selector};
use crate::store::{ContentStore, StoreQuery};
use log::error;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const CONTENT_ITEM_BY_ID: &str = "contentItemById";
pub const CONTENT_ITEMS_BY_IDS: &str = "contentItemsByIds";
pub const CONTENT_ITEMS_BY_GROUP_ID: &str = "contentItemsByGroupId";
pub const CONTENT_ITEMS: &str = "contentItems";
pub const CONTENT_ITEMS_BY_QUERY: &str = "contentItemsByQuery";

/// Every resolver name, in schema order.
pub const RESOLVER_NAMES: &[&str] = &[
    CONTENT_ITEM_BY_ID,
    CONTENT_ITEMS_BY_IDS,
    CONTENT_ITEMS_BY_GROUP_ID,
    CONTENT_ITEMS,
    CONTENT_ITEMS_BY_QUERY,
];

#[derive(Debug, Deserialize)]
struct ByIdArgs {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ByIdsArgs {
    ids: Vec<String>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ByGroupIdArgs {
    group_id: String,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct FilterArgs {
    filter: Filter,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: MultiAxisQuery,
    #[serde(default)]
    pagination: Option<Pagination>,
}

fn parse_args<T: DeserializeOwned>(resolver: &str, args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| MdGraphError::invalid_query(resolver, e.to_string()))
}

/// A store failure at the query boundary: logged, then answered with `fallback`.
fn degrade<T>(resolver: &str, result: Result<T>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!("[{resolver}] {e}");
            fallback
        }
    }
}

/// Resolvers over one content store.
#[derive(Clone)]
pub struct Resolvers {
    store: Arc<ContentStore>,
}

impl Resolvers {
    pub fn new(store: Arc<ContentStore>) -> Self {
        Resolvers { store }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// The item with `id`. `None` for an empty id, no match, or a store failure.
    pub fn content_item_by_id(&self, id: &str) -> Option<Value> {
        if id.is_empty() {
            return None;
        }
        let result = self.store.find_one(&StoreQuery::eq("id", id));
        degrade(CONTENT_ITEM_BY_ID, result, None)
    }

    pub fn content_items_by_ids(
        &self,
        ids: &[String],
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        let selector = Selector::by_ids(ids.iter().cloned())?;
        self.run(CONTENT_ITEMS_BY_IDS, QuerySpec::new(selector, pagination))
    }

    pub fn content_items_by_group_id(
        &self,
        group_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        let selector = Selector::by_group_id(group_id)?;
        self.run(CONTENT_ITEMS_BY_GROUP_ID, QuerySpec::new(selector, pagination))
    }

    pub fn content_items(&self, filter: Filter, pagination: Pagination) -> Result<Vec<Value>> {
        let selector = filter.into_selector()?;
        self.run(CONTENT_ITEMS, QuerySpec::new(selector, pagination))
    }

    /// Ids, group ids and field matchers, any of which may match.
    #[deprecated(note = "use content_items with a filter")]
    pub fn content_items_by_query(
        &self,
        query: MultiAxisQuery,
        pagination: Pagination,
    ) -> Result<Vec<Value>> {
        self.run(
            CONTENT_ITEMS_BY_QUERY,
            QuerySpec::new(Selector::MultiAxis(query), pagination),
        )
    }

    /// Run a decided query.
    pub fn query(&self, spec: &QuerySpec) -> Result<Vec<Value>> {
        self.run(CONTENT_ITEMS, spec.clone())
    }

    fn run(&self, resolver: &str, spec: QuerySpec) -> Result<Vec<Value>> {
        let plan = translate(&spec)?;
        let result = self.store.find(&plan.query, &plan.options);
        Ok(degrade(resolver, result, Vec::new()))
    }

    /// Call a resolver by name with JSON arguments.
    #[allow(deprecated)]
    pub fn resolve(&self, name: &str, args: Value) -> Result<Value> {
        match name {
            CONTENT_ITEM_BY_ID => {
                let args: ByIdArgs = parse_args(name, args)?;
                Ok(self.content_item_by_id(&args.id).unwrap_or(Value::Null))
            }
            CONTENT_ITEMS_BY_IDS => {
                let args: ByIdsArgs = parse_args(name, args)?;
                self.content_items_by_ids(&args.ids, args.pagination.unwrap_or_default())
                    .map(Value::Array)
            }
            CONTENT_ITEMS_BY_GROUP_ID => {
                let args: ByGroupIdArgs = parse_args(name, args)?;
                self.content_items_by_group_id(&args.group_id, args.pagination.unwrap_or_default())
                    .map(Value::Array)
            }
            CONTENT_ITEMS => {
                let args: FilterArgs = parse_args(name, args)?;
                self.content_items(args.filter, args.pagination.unwrap_or_default())
                    .map(Value::Array)
            }
            CONTENT_ITEMS_BY_QUERY => {
                let args: QueryArgs = parse_args(name, args)?;
                self.content_items_by_query(args.query, args.pagination.unwrap_or_default())
                    .map(Value::Array)
            }
            other => Err(MdGraphError::invalid_query(
                "resolver",
                format!("unknown resolver '{other}', expected one of {}", RESOLVER_NAMES.join(", ")),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn resolvers() -> Resolvers {
        let store = ContentStore::open_in_memory().unwrap();
        store
            .insert(&[
                json!({ "id": "a", "groupId": "g", "html": "<p>a</p>", "order": 1, "temperature": 30.5, "markdown": "a", "assetDir": "g", "images": [] }),
                json!({ "id": "b", "groupId": "g", "html": "<p>b</p>", "order": 2, "temperature": 345.5, "markdown": "b", "assetDir": "g", "images": [] }),
                json!({ "id": "c", "groupId": "h", "html": "<p>c</p>", "order": 3, "temperature": 30.5, "markdown": "c", "assetDir": "h", "images": [] }),
            ])
            .unwrap();
        Resolvers::new(Arc::new(store))
    }

    fn ids(value: &Value) -> Vec<&str> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_content_item_by_id_is_projected() {
        let r = resolvers();
        assert_eq!(
            r.content_item_by_id("a").unwrap(),
            json!({ "id": "a", "groupId": "g", "html": "<p>a</p>", "order": 1, "temperature": 30.5 })
        );
        assert_eq!(r.content_item_by_id(""), None);
        assert_eq!(r.content_item_by_id("zzz"), None);
    }

    #[test]
    fn test_resolve_by_ids() {
        let r = resolvers();
        let items = r.resolve(CONTENT_ITEMS_BY_IDS, json!({ "ids": ["a"] })).unwrap();
        assert_eq!(ids(&items), vec!["a"]);
        assert!(items[0].get("markdown").is_none());

        let err = r.resolve(CONTENT_ITEMS_BY_IDS, json!({ "ids": [] })).unwrap_err();
        assert!(matches!(err, MdGraphError::InvalidQuery { .. }));
    }

    #[test]
    fn test_resolve_by_group_id() {
        let r = resolvers();
        let items = r
            .resolve(CONTENT_ITEMS_BY_GROUP_ID, json!({ "groupId": "g" }))
            .unwrap();
        assert_eq!(ids(&items), vec!["a", "b"]);
    }

    #[test]
    fn test_resolve_filter_and_or() {
        let r = resolvers();
        let items = r
            .resolve(
                CONTENT_ITEMS,
                json!({ "filter": { "AND": { "groupId": "g", "temperature": 30.5 } } }),
            )
            .unwrap();
        assert_eq!(ids(&items), vec!["a"]);

        let items = r
            .resolve(
                CONTENT_ITEMS,
                json!({ "filter": { "OR": [{ "groupId": "g" }, { "temperature": 345.5 }] } }),
            )
            .unwrap();
        assert_eq!(ids(&items), vec!["a", "b"]);

        let items = r
            .resolve(
                CONTENT_ITEMS,
                json!({ "filter": { "OR": [{ "groupId": "h" }, { "order": 1 }] } }),
            )
            .unwrap();
        assert_eq!(ids(&items), vec!["a", "c"]);
    }

    #[test]
    fn test_resolve_sort_and_skip() {
        let r = resolvers();
        let items = r
            .resolve(
                CONTENT_ITEMS,
                json!({
                    "filter": { "OR": [{ "groupId": "g" }, { "groupId": "h" }] },
                    "pagination": { "sort": { "sortBy": "order", "orderBy": "DESCENDING" }, "skip": 1 }
                }),
            )
            .unwrap();
        assert_eq!(ids(&items), vec!["b", "a"]);

        let items = r
            .resolve(
                CONTENT_ITEMS_BY_GROUP_ID,
                json!({ "groupId": "g", "pagination": { "skip": 5 } }),
            )
            .unwrap();
        assert_eq!(items, json!([]));
    }

    #[test]
    fn test_resolve_by_query() {
        let r = resolvers();
        let items = r
            .resolve(
                CONTENT_ITEMS_BY_QUERY,
                json!({ "query": { "ids": ["c"], "groupIds": ["g"] }, "pagination": { "limit": 2 } }),
            )
            .unwrap();
        assert_eq!(ids(&items), vec!["a", "b"]);
    }

    #[test]
    fn test_query_runs_a_decided_spec() {
        let r = resolvers();
        let spec = QuerySpec::new(
            Selector::ByAnd(json!({ "temperature": 30.5 }).as_object().unwrap().clone()),
            Pagination {
                sort: Some(crate::query::Sort {
                    sort_by: "order".into(),
                    order_by: Some("DESCENDING".into()),
                }),
                ..Pagination::default()
            },
        );
        let items = Value::Array(r.query(&spec).unwrap());
        assert_eq!(ids(&items), vec!["c", "a"]);

        let spec = QuerySpec::new(Selector::ByIds(Vec::new()), Pagination::default());
        assert!(matches!(r.query(&spec).unwrap_err(), MdGraphError::InvalidQuery { .. }));
    }

    #[test]
    fn test_resolve_by_id_null() {
        let r = resolvers();
        assert_eq!(r.resolve(CONTENT_ITEM_BY_ID, json!({ "id": "nope" })).unwrap(), Value::Null);
        assert_eq!(r.resolve(CONTENT_ITEM_BY_ID, Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let r = resolvers();
        let err = r.resolve("contentItem", json!({})).unwrap_err();
        assert!(matches!(err, MdGraphError::InvalidQuery { ref param, .. } if param == "resolver"));

        let err = r.resolve(CONTENT_ITEMS, json!({ "filter": "x" })).unwrap_err();
        assert!(matches!(err, MdGraphError::InvalidQuery { ref param, .. } if param == CONTENT_ITEMS));

        let err = r
            .resolve(CONTENT_ITEMS, json!({ "filter": { "AND": { "a": 1 }, "OR": [{ "b": 1 }] } }))
            .unwrap_err();
        assert!(matches!(err, MdGraphError::InvalidQuery { ref param, .. } if param == "filter"));
    }

    #[test]
    fn test_degrade_logs_and_falls_back() {
        let result: Result<Vec<Value>> = Err(MdGraphError::Other("boom".into()));
        assert_eq!(degrade("test", result, Vec::new()), Vec::<Value>::new());
    }
}
