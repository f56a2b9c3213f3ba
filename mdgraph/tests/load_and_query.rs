//! End to end: a content tree on disk is loaded and queried through the
//! published resolvers.

use mdgraph::{load_markdown, ContentStore, LoadOptions, MdGraphError, PublishedSchema};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn weather_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(
        root,
        "cities/london.md",
        "---\nid: london\ngroupId: g\norder: 1\ntemperature: 30.5\ntags: [rain, fog]\n---\n# London\n",
    );
    write(
        root,
        "cities/paris.md",
        "---\nid: paris\ngroupId: g\norder: 2\ntemperature: 345.5\ntags: [sun]\n---\n# Paris\n",
    );
    write(
        root,
        "cities/rome.md",
        "---\nid: rome\ngroupId: g\norder: 3\ntemperature: 30.5\n---\n# Rome\n",
    );
    write(
        root,
        "planets/mars.md",
        "---\nid: mars\norder: 4\ntemperature: 345.5\n---\n# Mars\n",
    );
    tmp
}

async fn load(root: &Path) -> mdgraph::Result<PublishedSchema> {
    let store = Arc::new(ContentStore::open_in_memory().unwrap());
    load_markdown(LoadOptions::new(root), store).await
}

fn ids(items: &Value) -> Vec<&str> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_schema_is_inferred_from_front_matter() {
    let tmp = weather_tree();
    let published = load(tmp.path()).await.unwrap();
    assert_eq!(published.file_count, 4);

    let fields = serde_json::to_value(&published.registry).unwrap();
    assert_eq!(fields["order"]["type"], "Int");
    assert_eq!(fields["temperature"]["type"], "Float");
    assert_eq!(fields["tags"]["type"], "[String]");
    assert_eq!(fields["tags"]["source"], "cities/london.md");

    for target in ["ContentItem", "ContentItemFields"] {
        let def = published.type_defs.type_definition(target).unwrap();
        assert_eq!(def.field("temperature").unwrap().ty.to_string(), "Float");
        assert_eq!(def.field("tags").unwrap().ty.to_string(), "[String]");
    }
    let item = published.type_defs.type_definition("ContentItem").unwrap();
    assert_eq!(item.field("id").unwrap().ty.to_string(), "ID!");
    assert_eq!(item.fields.iter().filter(|f| f.name == "groupId").count(), 1);

    // The published text is the published structure.
    let reparsed = mdgraph::TypeDefs::parse(published.type_defs.source()).unwrap();
    assert_eq!(reparsed, published.type_defs);
}

#[tokio::test]
async fn test_query_by_ids_and_group() {
    let tmp = weather_tree();
    let r = load(tmp.path()).await.unwrap().resolvers;

    let items = r.resolve("contentItemsByIds", json!({ "ids": ["london"] })).unwrap();
    assert_eq!(
        items,
        json!([{
            "id": "london",
            "groupId": "g",
            "html": "<h1 id=\"london\">London</h1>\n",
            "order": 1,
            "temperature": 30.5,
            "tags": ["rain", "fog"]
        }])
    );

    let err = r.resolve("contentItemsByIds", json!({ "ids": [] })).unwrap_err();
    assert!(matches!(err, MdGraphError::InvalidQuery { .. }));

    let items = r
        .resolve("contentItemsByGroupId", json!({ "groupId": "planets" }))
        .unwrap();
    assert_eq!(ids(&items), vec!["mars"]);
}

#[tokio::test]
async fn test_filters() {
    let tmp = weather_tree();
    let r = load(tmp.path()).await.unwrap().resolvers;

    let items = r
        .resolve(
            "contentItems",
            json!({ "filter": { "AND": { "groupId": "g", "temperature": 30.5 } } }),
        )
        .unwrap();
    assert_eq!(ids(&items), vec!["london", "rome"]);

    let items = r
        .resolve(
            "contentItems",
            json!({ "filter": { "OR": [{ "groupId": "g" }, { "temperature": 345.5 }] } }),
        )
        .unwrap();
    assert_eq!(ids(&items), vec!["london", "paris", "rome", "mars"]);

    let items = r
        .resolve("contentItems", json!({ "filter": { "AND": { "tags": "sun" } } }))
        .unwrap();
    assert_eq!(ids(&items), vec!["paris"]);
}

#[tokio::test]
async fn test_sort_skip_limit() {
    let tmp = weather_tree();
    let r = load(tmp.path()).await.unwrap().resolvers;

    let items = r
        .resolve(
            "contentItemsByGroupId",
            json!({
                "groupId": "g",
                "pagination": { "sort": { "sortBy": "order", "orderBy": "DESCENDING" }, "skip": 1 }
            }),
        )
        .unwrap();
    let orders: Vec<i64> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["order"].as_i64().unwrap())
        .collect();
    assert_eq!(orders, vec![2, 1]);

    let items = r
        .resolve(
            "contentItemsByGroupId",
            json!({ "groupId": "g", "pagination": { "sort": { "sortBy": "order" }, "limit": 2 } }),
        )
        .unwrap();
    assert_eq!(ids(&items), vec!["london", "paris"]);

    let items = r
        .resolve(
            "contentItems",
            json!({ "filter": { "AND": { "temperature": 345.5 } }, "pagination": { "skip": 5 } }),
        )
        .unwrap();
    assert_eq!(items, json!([]));
}

#[tokio::test]
async fn test_conflicting_types_fail_the_load() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "a.md", "---\nid: a\ntemperature: 30.5\n---\n");
    write(root, "b.md", "---\nid: b\ntemperature: warm\n---\n");

    let err = load(root).await.err().unwrap();
    let message = err.to_string();
    assert!(message.contains("a.md"), "{message}");
    assert!(message.contains("b.md"), "{message}");
    assert!(matches!(err, MdGraphError::SchemaConflict { .. }));
}

#[tokio::test]
async fn test_mixed_list_fails_the_load() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.md", "---\nid: a\ntags: [foo, 1]\n---\n");
    let err = load(tmp.path()).await.err().unwrap();
    assert!(matches!(err, MdGraphError::MixedList { .. }), "{err:?}");
}

#[tokio::test]
async fn test_config_file_changes_targets() {
    let tmp = weather_tree();
    write(tmp.path(), "mdgraph.yaml", "splice_targets: [ContentItem]\nimages: keep\n");
    let options = LoadOptions::discover(tmp.path()).unwrap();
    let store = Arc::new(ContentStore::open_in_memory().unwrap());
    let published = load_markdown(options, store).await.unwrap();

    let fields = published.type_defs.type_definition("ContentItemFields").unwrap();
    assert!(fields.field("temperature").is_none());
    let item = published.type_defs.type_definition("ContentItem").unwrap();
    assert!(item.field("temperature").is_some());
}
