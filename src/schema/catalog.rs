//! Catalog lookup contract and handle resolution
//!
//! A catalog answers "which type IRI backs table `t`" and "which predicate IRI
//! backs column `c`". Misses fall back to a deterministic default-namespace
//! construction unless the resolver runs in strict mode.

use crate::config::ConverterConfig;
use crate::error::{Error, Result};
use crate::metrics::global_metrics;
use crate::types::{local_name, Iri};
use tracing::warn;

/// Synthetic column denoting the entity itself
pub const SUBJECT_COLUMN: &str = "subject";

/// An edge predicate a catalog declares for a column-to-column join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    pub predicate: Iri,
    /// `true` when the edge points from the join's left relation to its right one
    pub forward: bool,
}

/// Read-only relational view over graph data
pub trait Catalog: Send + Sync {
    /// Type handle backing a table, if the catalog knows it
    fn lookup_type(&self, table: &str) -> Option<Iri>;

    /// Predicate handle backing a column, if the catalog knows it
    fn lookup_predicate(&self, column: &str) -> Option<Iri>;

    /// Known table names, sorted
    fn table_names(&self) -> Vec<String>;

    /// Columns of a table, `subject` first
    fn columns(&self, table: &str) -> Option<Vec<String>>;

    fn join_edge(
        &self,
        _left_table: &str,
        _left_column: &str,
        _right_table: &str,
        _right_column: &str,
    ) -> Option<JoinEdge> {
        None
    }

    fn primary_key(&self, _table: &str) -> Option<Vec<String>> {
        None
    }

    fn has_table(&self, table: &str) -> bool {
        self.lookup_type(table).is_some()
    }

    /// Whether `table.column` exists in this catalog
    fn validate(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .map(|cols| cols.iter().any(|c| c.eq_ignore_ascii_case(column)))
            .unwrap_or(false)
    }
}

/// Catalog with no entries; every lookup takes the fallback path
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyCatalog;

impl Catalog for EmptyCatalog {
    fn lookup_type(&self, _table: &str) -> Option<Iri> {
        None
    }

    fn lookup_predicate(&self, _column: &str) -> Option<Iri> {
        None
    }

    fn table_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn columns(&self, _table: &str) -> Option<Vec<String>> {
        None
    }
}

/// Table name derived from a type handle: lowercased local name.
pub fn table_name_for(type_iri: &str) -> String {
    local_name(type_iri).to_lowercase()
}

/// Attribute name derived from a predicate handle: lowercased local name.
pub fn attribute_name_for(predicate_iri: &str) -> String {
    local_name(predicate_iri).to_lowercase()
}

/// Title-case a table name for default type handles (`order_item` -> `Order_Item`).
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = !c.is_numeric();
        }
    }
    out
}

/// Resolves table and column names to handles for one conversion
pub struct HandleResolver<'a> {
    catalog: &'a dyn Catalog,
    config: &'a ConverterConfig,
}

impl<'a> HandleResolver<'a> {
    pub fn new(catalog: &'a dyn Catalog, config: &'a ConverterConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &'a dyn Catalog {
        self.catalog
    }

    pub fn config(&self) -> &'a ConverterConfig {
        self.config
    }

    pub fn is_strict(&self) -> bool {
        self.config.strict
    }

    pub fn type_handle_for(&self, table: &str) -> Result<Iri> {
        if let Some(iri) = self.catalog.lookup_type(table) {
            return Ok(iri);
        }
        if self.config.strict {
            return Err(Error::unsupported(format!("未知的表: {}", table)));
        }
        warn!(table, "table not in catalog, using default type namespace");
        global_metrics().record_fallback();
        Ok(Iri::new(format!(
            "{}{}",
            self.config.type_namespace,
            title_case(table)
        )))
    }

    pub fn predicate_handle_for(&self, column: &str) -> Result<Iri> {
        if let Some(iri) = self.catalog.lookup_predicate(column) {
            return Ok(iri);
        }
        if self.config.strict {
            return Err(Error::unsupported(format!("未知的列: {}", column)));
        }
        warn!(column, "column not in catalog, using default predicate namespace");
        global_metrics().record_fallback();
        Ok(Iri::new(format!(
            "{}{}",
            self.config.predicate_namespace, column
        )))
    }

    /// Fresh entity IRI for an inserted row of `table`
    pub fn entity_iri(&self, table: &str, id: &str) -> Iri {
        Iri::new(format!("{}{}/{}", self.config.entity_namespace, table, id))
    }

    pub fn join_edge(
        &self,
        left_table: &str,
        left_column: &str,
        right_table: &str,
        right_column: &str,
    ) -> Option<JoinEdge> {
        self.catalog
            .join_edge(left_table, left_column, right_table, right_column)
    }

    pub fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.catalog.columns(table)
    }
}
