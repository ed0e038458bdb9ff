//! Dataset-specific catalog loaded from a static mapping file
//!
//! ```json
//! {
//!   "tables": { "customer": "http://northwind.example.org/ontology/Customer" },
//!   "columns": { "companyName": "http://northwind.example.org/ontology/companyName" },
//!   "table_columns": { "customer": ["customerID", "companyName"] },
//!   "joins": [{ "from_table": "orders", "from_column": "customerID",
//!               "to_table": "customer", "to_column": "customerID",
//!               "predicate": "http://northwind.example.org/ontology/customer" }],
//!   "primary_keys": { "customer": ["customerID"] }
//! }
//! ```

use super::catalog::{Catalog, JoinEdge, SUBJECT_COLUMN};
use crate::error::{Error, Result};
use crate::types::Iri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Edge predicate linking `from_table` entities to `to_table` entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMapping {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub predicate: String,
}

impl JoinMapping {
    fn matches(&self, lt: &str, lc: &str, rt: &str, rc: &str) -> bool {
        self.from_table.eq_ignore_ascii_case(lt)
            && self.from_column.eq_ignore_ascii_case(lc)
            && self.to_table.eq_ignore_ascii_case(rt)
            && self.to_column.eq_ignore_ascii_case(rc)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappedCatalog {
    /// table -> type IRI
    pub tables: BTreeMap<String, String>,
    /// column -> predicate IRI
    pub columns: BTreeMap<String, String>,
    /// table -> declared columns (without `subject`)
    pub table_columns: BTreeMap<String, Vec<String>>,
    pub joins: Vec<JoinMapping>,
    pub primary_keys: BTreeMap<String, Vec<String>>,
}

fn find_ci<'a, V>(map: &'a BTreeMap<String, V>, key: &str) -> Option<&'a V> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

impl MappedCatalog {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("读取映射文件 {:?} 失败: {}", path, e)))?;
        Self::from_json(&data)
    }
}

impl Catalog for MappedCatalog {
    fn lookup_type(&self, table: &str) -> Option<Iri> {
        find_ci(&self.tables, table).map(|iri| Iri::new(iri.clone()))
    }

    fn lookup_predicate(&self, column: &str) -> Option<Iri> {
        find_ci(&self.columns, column).map(|iri| Iri::new(iri.clone()))
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn columns(&self, table: &str) -> Option<Vec<String>> {
        if !self.has_table(table) {
            return None;
        }
        let mut cols = vec![SUBJECT_COLUMN.to_string()];
        if let Some(declared) = find_ci(&self.table_columns, table) {
            cols.extend(declared.iter().cloned());
        }
        Some(cols)
    }

    fn join_edge(
        &self,
        left_table: &str,
        left_column: &str,
        right_table: &str,
        right_column: &str,
    ) -> Option<JoinEdge> {
        self.joins.iter().find_map(|j| {
            if j.matches(left_table, left_column, right_table, right_column) {
                Some(JoinEdge {
                    predicate: Iri::new(j.predicate.clone()),
                    forward: true,
                })
            } else if j.matches(right_table, right_column, left_table, left_column) {
                Some(JoinEdge {
                    predicate: Iri::new(j.predicate.clone()),
                    forward: false,
                })
            } else {
                None
            }
        })
    }

    fn primary_key(&self, table: &str) -> Option<Vec<String>> {
        find_ci(&self.primary_keys, table).cloned()
    }
}
