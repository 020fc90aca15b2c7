use std::collections::{BTreeMap, BTreeSet};

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::filter::FilterSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// One page fetch: window, ordering, filters and server-side include hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub relations: BTreeSet<String>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            sort: Vec::new(),
            filters: FilterSet::new(),
            relations: BTreeSet::new(),
        }
    }
}

/// `total_count` is the server's count of every matching row, not `rows.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub rows: Vec<T>,
    pub total_count: u64,
}

impl<T> Default for PageResult<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            total_count: 0,
        }
    }
}

/// Left-join hints forwarded to the server query builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    pub alias: String,
    #[serde(default)]
    pub left_join: BTreeMap<String, String>,
}

impl JoinSpec {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            left_join: BTreeMap::new(),
        }
    }

    pub fn left_join(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.left_join.insert(alias.into(), path.into());
        self
    }
}

/// JSON envelope sent as `?data=` on every collection GET.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub relations: Vec<String>,
    pub find_input: Map<String, Value>,
    pub page: u32,
    pub page_size: u32,
    #[serde(serialize_with = "serialize_sort")]
    pub sort: Vec<SortSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSpec>,
}

impl ListQuery {
    /// Caller filters override `base_where` entries with the same key.
    pub fn build(
        base_where: &Map<String, Value>,
        fixed_relations: &BTreeSet<String>,
        join: Option<&JoinSpec>,
        page: u32,
        page_size: u32,
        filters: &FilterSet,
        sort: &[SortSpec],
    ) -> Self {
        let mut find_input = base_where.clone();
        find_input.extend(filters.to_find_input());
        Self {
            relations: fixed_relations.iter().cloned().collect(),
            find_input,
            page: page.max(1),
            page_size: page_size.max(1),
            sort: sort.to_vec(),
            join: join.cloned(),
        }
    }

    pub fn with_relations<'a>(mut self, extra: impl IntoIterator<Item = &'a String>) -> Self {
        let mut relations: BTreeSet<String> = self.relations.into_iter().collect();
        relations.extend(extra.into_iter().cloned());
        self.relations = relations.into_iter().collect();
        self
    }

    pub fn to_query_param(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn serialize_sort<S: Serializer>(sort: &[SortSpec], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(sort.len()))?;
    for spec in sort {
        map.serialize_entry(&spec.field, &spec.direction)?;
    }
    map.end()
}

/// Collection response body: one page of rows plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub total: u64,
}
