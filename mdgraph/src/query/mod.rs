//! Translation of content queries into store queries.
//!
//! Requests are decided into a [`Selector`] once, at the API boundary
//! ([`Filter::into_selector`], [`Selector::by_ids`], ...). [`translate`] then
//! turns a [`QuerySpec`] into a [`StorePlan`] without looking at request shapes
//! again.

use crate::error::{MdGraphError, Result};
use crate::store::{is_field_name, FindOptions, SortKey, SortOrder, StoreQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name to value equality matchers, conjoined.
pub type FieldMap = Map<String, Value>;

// ── Requests ────────────────────────────────────────────────────

/// Which content items a query selects.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    ByIds(Vec<String>),
    ByGroupId(String),
    ByAnd(FieldMap),
    ByOr(Vec<FieldMap>),
    /// Ids, group ids and field matchers at once, disjoined. Only backs the
    /// deprecated `contentItemsByQuery` resolver.
    MultiAxis(MultiAxisQuery),
}

impl Selector {
    pub fn by_ids<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(MdGraphError::invalid_query("ids", "expects at least one id"));
        }
        Ok(Selector::ByIds(ids))
    }

    pub fn by_group_id(group_id: impl Into<String>) -> Result<Self> {
        let group_id = group_id.into();
        if group_id.is_empty() {
            return Err(MdGraphError::invalid_query("groupId", "expects a groupId"));
        }
        Ok(Selector::ByGroupId(group_id))
    }
}

/// `filter` argument of `contentItems`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "AND", default, skip_serializing_if = "Option::is_none")]
    pub and: Option<FieldMap>,
    #[serde(rename = "OR", default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<Value>>,
}

impl Filter {
    /// Decide the filter's selector. AND and OR cannot be combined, and at
    /// least one of them must hold a matcher.
    pub fn into_selector(self) -> Result<Selector> {
        let and = self.and.unwrap_or_default();
        let or = self.or.unwrap_or_default();

        match (and.is_empty(), or.is_empty()) {
            (false, false) => Err(MdGraphError::invalid_query(
                "filter",
                "AND and OR cannot be combined in one filter",
            )),
            (false, true) => Ok(Selector::ByAnd(and)),
            (true, false) => {
                let clauses = or
                    .into_iter()
                    .map(|clause| match clause {
                        Value::Object(map) if !map.is_empty() => Ok(map),
                        _ => Err(MdGraphError::invalid_query(
                            "filter.OR",
                            "every OR clause must match at least one field",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Selector::ByOr(clauses))
            }
            (true, true) => Err(MdGraphError::invalid_query(
                "filter",
                "expects at least one field in AND or one clause in OR",
            )),
        }
    }
}

/// `query` argument of the deprecated `contentItemsByQuery`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiAxisQuery {
    pub ids: Vec<String>,
    pub group_ids: Vec<String>,
    pub fields: Vec<FieldMatcher>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatcher {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl MultiAxisQuery {
    fn active_axes(&self) -> usize {
        [
            !self.ids.is_empty(),
            !self.group_ids.is_empty(),
            !self.fields.is_empty(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    pub sort_by: String,
    /// `DESCENDING` sorts descending; anything else, or nothing, ascending.
    #[serde(default)]
    pub order_by: Option<String>,
}

/// Sort and window. A `skip` or `limit` of 0 means no skip or no limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub sort: Option<Sort>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub selector: Selector,
    pub pagination: Pagination,
}

impl QuerySpec {
    pub fn new(selector: Selector, pagination: Pagination) -> Self {
        QuerySpec {
            selector,
            pagination,
        }
    }
}

// ── Translation ─────────────────────────────────────────────────

/// A store query with its sort and window.
#[derive(Debug, Clone, PartialEq)]
pub struct StorePlan {
    pub query: StoreQuery,
    pub options: FindOptions,
}

pub fn sort_order(order_by: Option<&str>) -> SortOrder {
    match order_by {
        Some("DESCENDING") => SortOrder::Descending,
        _ => SortOrder::Ascending,
    }
}

/// Translate a query into a store plan.
pub fn translate(spec: &QuerySpec) -> Result<StorePlan> {
    Ok(StorePlan {
        query: translate_selector(&spec.selector)?,
        options: translate_pagination(&spec.pagination)?,
    })
}

pub fn translate_selector(selector: &Selector) -> Result<StoreQuery> {
    match selector {
        Selector::ByIds(ids) => {
            if ids.is_empty() {
                return Err(MdGraphError::invalid_query("ids", "expects at least one id"));
            }
            Ok(ids_query(ids))
        }
        Selector::ByGroupId(group_id) => {
            if group_id.is_empty() {
                return Err(MdGraphError::invalid_query("groupId", "expects a groupId"));
            }
            Ok(StoreQuery::eq("groupId", group_id.as_str()))
        }
        Selector::ByAnd(fields) => {
            if fields.is_empty() {
                return Err(MdGraphError::invalid_query(
                    "filter.AND",
                    "expects at least one field",
                ));
            }
            field_map_query(fields, "filter.AND")
        }
        Selector::ByOr(clauses) => {
            if clauses.is_empty() {
                return Err(MdGraphError::invalid_query(
                    "filter.OR",
                    "expects at least one clause",
                ));
            }
            let queries = clauses
                .iter()
                .map(|clause| {
                    if clause.is_empty() {
                        return Err(MdGraphError::invalid_query(
                            "filter.OR",
                            "every OR clause must match at least one field",
                        ));
                    }
                    field_map_query(clause, "filter.OR")
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(StoreQuery::Or(queries))
        }
        Selector::MultiAxis(query) => multi_axis_query(query),
    }
}

fn ids_query(ids: &[String]) -> StoreQuery {
    StoreQuery::is_in(
        "id",
        ids.iter().map(|id| Value::String(id.clone())).collect(),
    )
}

fn field_map_query(fields: &FieldMap, param: &str) -> Result<StoreQuery> {
    let mut queries = fields
        .iter()
        .map(|(field, value)| matcher(field, value, param))
        .collect::<Result<Vec<_>>>()?;
    if queries.len() == 1 {
        Ok(queries.remove(0))
    } else {
        Ok(StoreQuery::And(queries))
    }
}

fn matcher(field: &str, value: &Value, param: &str) -> Result<StoreQuery> {
    if !is_field_name(field) {
        return Err(MdGraphError::invalid_query(
            param,
            format!("'{field}' is not a valid field name"),
        ));
    }
    if value.is_array() || value.is_object() {
        return Err(MdGraphError::invalid_query(
            param,
            format!("'{field}' must be matched against a scalar value"),
        ));
    }
    Ok(StoreQuery::eq(field, value.clone()))
}

fn multi_axis_query(query: &MultiAxisQuery) -> Result<StoreQuery> {
    if query.active_axes() == 0 {
        return Err(MdGraphError::invalid_query(
            "query",
            "expects at least one of ids, groupIds or fields",
        ));
    }

    let mut axes = Vec::new();
    if !query.ids.is_empty() {
        axes.push(ids_query(&query.ids));
    }
    if !query.group_ids.is_empty() {
        axes.push(StoreQuery::is_in(
            "groupId",
            query
                .group_ids
                .iter()
                .map(|g| Value::String(g.clone()))
                .collect(),
        ));
    }
    if !query.fields.is_empty() {
        // A later matcher on the same field replaces an earlier one.
        let fields: FieldMap = query
            .fields
            .iter()
            .map(|m| (m.name.clone(), m.value.clone()))
            .collect();
        axes.push(field_map_query(&fields, "query.fields")?);
    }

    if axes.len() == 1 {
        Ok(axes.remove(0))
    } else {
        Ok(StoreQuery::Or(axes))
    }
}

pub fn translate_pagination(pagination: &Pagination) -> Result<FindOptions> {
    let sort = match &pagination.sort {
        Some(sort) => {
            if !is_field_name(&sort.sort_by) {
                return Err(MdGraphError::invalid_query(
                    "pagination.sort.sortBy",
                    format!("'{}' is not a valid field name", sort.sort_by),
                ));
            }
            Some(SortKey {
                field: sort.sort_by.clone(),
                order: sort_order(sort.order_by.as_deref()),
            })
        }
        None => None,
    };
    Ok(FindOptions {
        sort,
        skip: window(pagination.skip, "pagination.skip")?,
        limit: window(pagination.limit, "pagination.limit")?,
    })
}

fn window(value: Option<i64>, param: &str) -> Result<Option<usize>> {
    match value {
        None | Some(0) => Ok(None),
        Some(n) if n < 0 => Err(MdGraphError::invalid_query(param, "must not be negative")),
        Some(n) => Ok(Some(n as usize)),
    }
}
