//! Schema inference from RDF triples
//!
//! Every asserted `rdf:type` becomes a table; every other predicate becomes a
//! column of each type its subject carries. Subjects without a type land in the
//! catch-all `owl:Thing` table (`thing`).

use super::catalog::{attribute_name_for, table_name_for, Catalog, SUBJECT_COLUMN};
use crate::error::{Error, Result};
use crate::metrics::global_metrics;
use crate::types::{Iri, RdfTriple, OWL_THING};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

/// One virtual table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Type IRI backing this table
    pub type_iri: String,
    /// Column names, `subject` first
    pub columns: Vec<String>,
}

/// Catalog built by [`InferredCatalog::infer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredCatalog {
    tables: BTreeMap<String, TableSchema>,
    /// column name -> predicate IRI
    predicates: BTreeMap<String, String>,
}

impl InferredCatalog {
    /// Build a catalog from a triple set. The result does not depend on triple order.
    pub fn infer<'a, I>(triples: I) -> Self
    where
        I: IntoIterator<Item = &'a RdfTriple>,
    {
        let triples: Vec<&RdfTriple> = triples.into_iter().collect();

        // Pass 1: types per subject
        let mut subject_types: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        let mut type_columns: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for t in triples.iter().filter(|t| t.is_type_assertion()) {
            subject_types
                .entry(t.subject.as_str())
                .or_default()
                .insert(t.object.as_str());
            type_columns.entry(t.object.as_str()).or_default();
        }

        // Pass 2: predicates per type
        let mut predicates: BTreeMap<String, String> = BTreeMap::new();
        let untyped: BTreeSet<&str> = [OWL_THING].into_iter().collect();
        for t in triples.iter().filter(|t| !t.is_type_assertion()) {
            let column = attribute_name_for(&t.predicate);
            if column.is_empty() {
                continue;
            }
            let types = subject_types.get(t.subject.as_str()).unwrap_or(&untyped);
            for ty in types {
                type_columns.entry(*ty).or_default().insert(column.clone());
            }
            // Same local name under different namespaces: smallest IRI wins
            match predicates.get(&column) {
                Some(existing) if existing.as_str() <= t.predicate.as_str() => {}
                _ => {
                    predicates.insert(column, t.predicate.clone());
                }
            }
        }

        let mut tables: BTreeMap<String, TableSchema> = BTreeMap::new();
        for (type_iri, columns) in type_columns {
            let name = table_name_for(type_iri);
            if name.is_empty() {
                continue;
            }
            let table = tables.entry(name.clone()).or_insert_with(|| TableSchema {
                name,
                type_iri: type_iri.to_string(),
                columns: vec![SUBJECT_COLUMN.to_string()],
            });
            for column in columns {
                if column != SUBJECT_COLUMN && !table.columns.contains(&column) {
                    table.columns.push(column);
                }
            }
            table.columns[1..].sort();
        }

        debug!(
            triples = triples.len(),
            tables = tables.len(),
            columns = predicates.len(),
            "schema inferred"
        );
        global_metrics().record_catalog_inferred();

        Self { tables, predicates }
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table name -> column list view
    pub fn to_table_map(&self) -> BTreeMap<String, Vec<String>> {
        self.tables
            .iter()
            .map(|(name, t)| (name.clone(), t.columns.clone()))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("读取 schema 文件 {:?} 失败: {}", path, e)))?;
        Self::from_json(&data)
    }
}

impl Catalog for InferredCatalog {
    fn lookup_type(&self, table: &str) -> Option<Iri> {
        self.table(table).map(|t| Iri::new(t.type_iri.clone()))
    }

    fn lookup_predicate(&self, column: &str) -> Option<Iri> {
        self.predicates
            .get(&column.to_lowercase())
            .map(|p| Iri::new(p.clone()))
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.table(table).map(|t| t.columns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RDF_TYPE;

    const EX: &str = "http://example.org/";

    fn sample() -> Vec<RdfTriple> {
        vec![
            RdfTriple::new(format!("{EX}client/1"), RDF_TYPE, format!("{EX}types/Client")),
            RdfTriple::new(format!("{EX}client/1"), format!("{EX}ontology/name"), "Alice"),
            RdfTriple::new(format!("{EX}client/1"), format!("{EX}ontology/email"), "alice@example.com"),
            RdfTriple::new(format!("{EX}product/9"), RDF_TYPE, format!("{EX}types/Product")),
            RdfTriple::new(format!("{EX}product/9"), format!("{EX}ontology/price"), "99.5"),
            RdfTriple::new(format!("{EX}product/9"), format!("{EX}ontology/name"), "Desk"),
            RdfTriple::new(format!("{EX}misc/1"), format!("{EX}ontology/note"), "untyped"),
        ]
    }

    #[test]
    fn test_infer_tables() {
        let catalog = InferredCatalog::infer(&sample());

        assert_eq!(catalog.table_names(), vec!["client", "product", "thing"]);
        assert_eq!(
            catalog.columns("client").unwrap(),
            vec!["subject", "email", "name"]
        );
        assert_eq!(
            catalog.columns("product").unwrap(),
            vec!["subject", "name", "price"]
        );
        assert_eq!(catalog.columns("thing").unwrap(), vec!["subject", "note"]);
        assert!(catalog.validate("client", "email"));
        assert!(!catalog.validate("client", "price"));
    }

    #[test]
    fn test_infer_is_order_independent() {
        let mut triples = sample();
        let forward = InferredCatalog::infer(&triples);
        triples.reverse();
        let backward = InferredCatalog::infer(&triples);
        assert_eq!(forward, backward);
        // Property asserted before the type is still attributed to the type
        assert!(backward.validate("client", "name"));
    }

    #[test]
    fn test_lookups() {
        let catalog = InferredCatalog::infer(&sample());
        assert_eq!(
            catalog.lookup_type("Client").unwrap().as_str(),
            "http://example.org/types/Client"
        );
        assert_eq!(
            catalog.lookup_predicate("price").unwrap().as_str(),
            "http://example.org/ontology/price"
        );
        assert!(catalog.lookup_type("supplier").is_none());
    }

    #[test]
    fn test_json_roundtrip_via_file() {
        let catalog = InferredCatalog::infer(&sample());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        catalog.save(&path).unwrap();

        let loaded = InferredCatalog::load(&path).unwrap();
        assert_eq!(catalog, loaded);
    }
}
