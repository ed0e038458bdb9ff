//! SQL → SPARQL 转换
//!
//! [`Converter`] is the entry point: parse, convert clause by clause into a
//! [`GraphQuery`], serialize. Catalog and configuration are shared read-only;
//! every call builds its own binding state, so one converter can serve
//! concurrent callers.

mod bindings;
mod combinator;
mod filter;
mod grouping;
mod mutation;
mod operators;
mod projection;
mod scope;

pub use bindings::{AliasBinding, BindingContext};
pub use mutation::{convert_delete, convert_insert};
pub use operators::like_to_regex;
pub use scope::{QueryScope, Relation, ScopePattern};

use crate::config::{default_id_generator, ConverterConfig, EntityIdGenerator};
use crate::error::Result;
use crate::metrics::{global_metrics, StatementKind};
use crate::query::{Query, QueryKind, SqlParser};
use crate::schema::{Catalog, HandleResolver};
use crate::sparql::{GraphQuery, PatternElement, SelectQuery, Serializer};
use std::sync::Arc;
use tracing::debug;

/// Convert one SELECT (or combined SELECT) on a fresh scope
pub(crate) fn convert_select(query: &Query, resolver: &HandleResolver<'_>) -> Result<SelectQuery> {
    if let Some(combination) = &query.combination {
        return combinator::convert_combination(query, combination, resolver);
    }
    let mut scope = QueryScope::new(query, resolver);
    scope.check_relations()?;
    let projection = scope.convert_projection()?;
    scope.convert_joins()?;
    scope.convert_conditions()?;
    let group_by = scope.convert_group_by()?;
    let having = scope.convert_having()?;
    let order_by = scope.convert_order_by()?;
    scope.type_unbound_relations()?;
    let pattern = scope.finish().into_group();

    Ok(SelectQuery {
        distinct: query.distinct,
        projection,
        pattern,
        group_by,
        having,
        order_by,
        limit: query.limit,
        offset: query.offset,
    })
}

#[derive(Clone)]
pub struct Converter {
    catalog: Arc<dyn Catalog>,
    config: ConverterConfig,
    id_generator: Arc<dyn EntityIdGenerator>,
}

impl Converter {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self::with_config(catalog, ConverterConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn Catalog>, config: ConverterConfig) -> Self {
        Self {
            catalog,
            config,
            id_generator: default_id_generator(),
        }
    }

    /// Replace the entity id source used by INSERT
    pub fn with_id_generator(mut self, id_generator: Arc<dyn EntityIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Same catalog and id source under a different configuration
    pub fn reconfigure(&self, config: ConverterConfig) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            config,
            id_generator: Arc::clone(&self.id_generator),
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// SQL text to SPARQL text
    pub fn convert(&self, sql: &str) -> Result<String> {
        let metrics = global_metrics();
        let timer = metrics.record_conversion_start();
        let result = self.translate(sql);
        match &result {
            Ok(query) => {
                metrics.record_statement(statement_kind(query));
                metrics.record_conversion_complete(timer, None);
            }
            Err(e) => metrics.record_conversion_complete(timer, Some(e.kind())),
        }
        let query = result?;
        let text = Serializer::new(self.config.emit_prefixes).serialize(&query);
        debug!(chars = text.len(), "conversion finished");
        Ok(text)
    }

    /// SQL text to the graph-pattern form, before serialization
    pub fn translate(&self, sql: &str) -> Result<GraphQuery> {
        let query = SqlParser::new(sql).strict(self.config.strict).parse()?;
        self.convert_query(&query)
    }

    pub fn convert_query(&self, query: &Query) -> Result<GraphQuery> {
        let resolver = HandleResolver::new(self.catalog.as_ref(), &self.config);
        match query.kind {
            QueryKind::Select => Ok(GraphQuery::Select(convert_select(query, &resolver)?)),
            QueryKind::Insert => convert_insert(query, &resolver, self.id_generator.as_ref()),
            QueryKind::Delete => convert_delete(query, &resolver),
        }
    }
}

fn statement_kind(query: &GraphQuery) -> StatementKind {
    match query {
        GraphQuery::Select(select) => {
            let combined = select
                .pattern
                .elements
                .iter()
                .any(|e| matches!(e, PatternElement::Union(_) | PatternElement::Exists { .. }));
            if combined {
                StatementKind::Combined
            } else {
                StatementKind::Select
            }
        }
        GraphQuery::InsertData(_) => StatementKind::Insert,
        GraphQuery::Delete { .. } => StatementKind::Delete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequentialGenerator;
    use crate::error::Error;
    use crate::schema::{EmptyCatalog, InferredCatalog};
    use crate::types::{RdfTriple, RDF_TYPE};

    fn converter() -> Converter {
        Converter::new(Arc::new(EmptyCatalog))
    }

    fn sample_catalog() -> InferredCatalog {
        let triples = vec![
            RdfTriple::new("http://example.org/client/1", RDF_TYPE, "http://example.org/types/Client"),
            RdfTriple::new("http://example.org/client/1", "http://example.org/ontology/name", "Bob"),
            RdfTriple::new("http://example.org/client/1", "http://example.org/ontology/age", "30"),
        ];
        InferredCatalog::infer(&triples)
    }

    #[test]
    fn test_select_with_filter_and_order() {
        let out = converter()
            .convert("SELECT name, age FROM client WHERE age >= 18 ORDER BY age DESC LIMIT 5 OFFSET 10")
            .unwrap();
        assert_eq!(
            out,
            "SELECT ?name ?age\n\
             WHERE {\n  \
             ?s0 <http://example.org/ontology/name> ?name .\n  \
             ?s0 <http://example.org/ontology/age> ?age .\n  \
             FILTER(?age >= 18)\n\
             }\n\
             ORDER BY DESC(?age)\n\
             LIMIT 5\n\
             OFFSET 10"
        );
    }

    #[test]
    fn test_conversion_is_reproducible() {
        let c = converter();
        let sql = "SELECT c.name, o.total FROM client c JOIN orders o ON c.id = o.client_id WHERE o.total > 100";
        assert_eq!(c.convert(sql).unwrap(), c.convert(sql).unwrap());
    }

    #[test]
    fn test_count_star_types_relation() {
        let out = converter().convert("SELECT COUNT(*) FROM product").unwrap();
        assert_eq!(
            out,
            "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
             SELECT (COUNT(*) AS ?count)\n\
             WHERE {\n  \
             ?s0 rdf:type <http://example.org/types/Product> .\n\
             }"
        );
    }

    #[test]
    fn test_insert_with_sequential_ids() {
        let c = converter().with_id_generator(Arc::new(SequentialGenerator::starting_at(7)));
        let out = c.convert("INSERT INTO client (name) VALUES ('Ann')").unwrap();
        assert!(out.contains("INSERT DATA {\n  <http://example.org/client/7> rdf:type"));
    }

    #[test]
    fn test_delete_without_filter_has_no_filter() {
        let out = converter().convert("DELETE FROM client").unwrap();
        assert!(out.contains("?s0 ?p ?o ."));
        assert!(!out.contains("FILTER"));
    }

    #[test]
    fn test_disjunction_binds_optional_columns() {
        let out = converter()
            .convert("SELECT name FROM client WHERE age > 10 OR email = 'x'")
            .unwrap();
        assert_eq!(
            out,
            "SELECT ?name\n\
             WHERE {\n  \
             ?s0 <http://example.org/ontology/name> ?name .\n  \
             OPTIONAL {\n    \
             ?s0 <http://example.org/ontology/age> ?age .\n  \
             }\n  \
             OPTIONAL {\n    \
             ?s0 <http://example.org/ontology/email> ?email .\n  \
             }\n  \
             FILTER(?age > 10 || ?email = \"x\")\n\
             }"
        );
    }

    #[test]
    fn test_prefix_header() {
        let c = converter();
        let out = c.convert("SELECT subject FROM client").unwrap();
        assert!(out.starts_with("PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\nSELECT ?s0\n"));
        let out = c.convert("SELECT name FROM client").unwrap();
        assert!(out.starts_with("SELECT ?name"));

        let config = ConverterConfig {
            emit_prefixes: false,
            ..ConverterConfig::default()
        };
        let out = c.reconfigure(config).convert("SELECT subject FROM client").unwrap();
        assert!(out.starts_with("SELECT ?s0\n"));
    }

    #[test]
    fn test_strict_mode_rejects_unknown_names() {
        let config = ConverterConfig::default().strict(true);
        let c = Converter::with_config(Arc::new(sample_catalog()), config);
        assert!(c.convert("SELECT name, age FROM client").is_ok());
        match c.convert("SELECT name FROM supplier") {
            Err(Error::UnsupportedConstruct(_)) => {}
            other => panic!("Expected UnsupportedConstruct, got {:?}", other),
        }
        match c.convert("SELECT FOO(age) FROM client") {
            Err(Error::UnsupportedConstruct(_)) => {}
            other => panic!("Expected UnsupportedConstruct, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_mode_falls_back() {
        let out = converter().convert("SELECT MEDIAN(age) FROM client").unwrap();
        assert!(out.starts_with("SELECT (COUNT(?age) AS ?count_age)"));
    }

    #[test]
    fn test_errors_surface_through_convert() {
        let c = converter();
        assert!(matches!(c.convert(""), Err(Error::Syntax { .. })));
        assert!(matches!(
            c.convert("UPDATE client SET name = 'x'"),
            Err(Error::UnsupportedConstruct(_))
        ));
        assert!(matches!(
            c.convert("SELECT a, b FROM t UNION SELECT a FROM u"),
            Err(Error::ProjectionMismatch { .. })
        ));
    }
}
