//! INSERT / DELETE converter

use super::scope::{QueryScope, Relation, ScopePattern};
use crate::config::EntityIdGenerator;
use crate::error::{Error, Result};
use crate::query::{Condition, InsertRows, Query, Value};
use crate::schema::{HandleResolver, SUBJECT_COLUMN};
use crate::sparql::{GraphQuery, TriplePattern};
use crate::types::{is_iri_like, looks_numeric, Iri, Literal, Term};
use indexmap::IndexMap;
use tracing::debug;

/// Insert value as an RDF term. `None` for NULL, which is skipped.
fn insert_term(value: &Value) -> Result<Option<Term>> {
    let term = match value {
        Value::String(s) if is_iri_like(s) => Iri::new(s.as_str()).into(),
        Value::String(s) if looks_numeric(s) => Literal::number(s.trim()).into(),
        Value::String(s) => Literal::string(s.as_str()).into(),
        Value::Number(n) => Literal::number(n.as_str()).into(),
        Value::Boolean(b) => Literal::Boolean(*b).into(),
        Value::Null => return Ok(None),
        Value::List(_) | Value::Range(_, _) => {
            return Err(Error::syntax("VALUES 只能包含单个常量", format!("{:?}", value)))
        }
    };
    Ok(Some(term))
}

/// Zip positional rows with the catalog's columns (without `subject`)
fn named_rows(
    resolver: &HandleResolver<'_>,
    table: &str,
    rows: &InsertRows,
) -> Result<Vec<IndexMap<String, Value>>> {
    let positional = match rows {
        InsertRows::Named(named) => return Ok(named.clone()),
        InsertRows::Positional(positional) => positional,
    };
    let columns: Vec<String> = resolver
        .columns(table)
        .ok_or_else(|| Error::syntax("未指定列清单且目录中没有该表", table.to_string()))?
        .into_iter()
        .filter(|c| !c.eq_ignore_ascii_case(SUBJECT_COLUMN))
        .collect();
    positional
        .iter()
        .map(|values| {
            if values.len() != columns.len() {
                return Err(Error::syntax(
                    format!("表 {} 有 {} 列, 提供了 {} 个值", table, columns.len(), values.len()),
                    table.to_string(),
                ));
            }
            Ok(columns.iter().cloned().zip(values.iter().cloned()).collect())
        })
        .collect()
}

/// `INSERT DATA`: one fresh entity per row, type triple first
pub fn convert_insert(
    query: &Query,
    resolver: &HandleResolver<'_>,
    ids: &dyn EntityIdGenerator,
) -> Result<GraphQuery> {
    let table = query
        .target
        .as_deref()
        .ok_or_else(|| Error::syntax("INSERT 缺少目标表", String::new()))?;
    let rows = query
        .insert_rows
        .as_ref()
        .ok_or_else(|| Error::syntax("INSERT 缺少 VALUES", table.to_string()))?;
    let type_iri = resolver.type_handle_for(table)?;

    let mut triples = Vec::new();
    for row in named_rows(resolver, table, rows)? {
        let entity = resolver.entity_iri(table, &ids.next_id());
        debug!(entity = %entity, "inserting entity");
        triples.push(TriplePattern::type_of(entity.clone(), type_iri.clone()));
        for (column, value) in &row {
            if column.eq_ignore_ascii_case(SUBJECT_COLUMN) {
                continue;
            }
            if let Some(object) = insert_term(value)? {
                let predicate = resolver.predicate_handle_for(column)?;
                triples.push(TriplePattern::new(entity.clone(), predicate, object));
            }
        }
    }
    Ok(GraphQuery::InsertData(triples))
}

/// `DELETE { .. } WHERE { .. }` guarded by the target's type triple
pub fn convert_delete(query: &Query, resolver: &HandleResolver<'_>) -> Result<GraphQuery> {
    let table = query
        .from
        .first()
        .ok_or_else(|| Error::syntax("DELETE 缺少目标表", String::new()))?;
    let mut scope = QueryScope::new(query, resolver);
    let subject = scope.ensure_typed(&Relation::from(table))?;
    scope.convert_conditions()?;

    // whole entities go when nothing or the subject itself is filtered
    let wildcard = if query.conditions.is_empty() || targets_subject(&query.conditions) {
        let predicate = scope.ctx.fresh("p");
        let object = scope.ctx.fresh("o");
        Some(TriplePattern::new(subject, predicate, object))
    } else {
        None
    };

    let ScopePattern {
        mut triples,
        optional,
        filters,
    } = scope.finish();
    let (guard, properties): (Vec<_>, Vec<_>) =
        triples.iter().cloned().partition(TriplePattern::is_type_assertion);
    let delete = wildcard
        .iter()
        .cloned()
        .chain(properties)
        .chain(optional.iter().cloned())
        .chain(guard)
        .collect();
    triples.extend(wildcard);
    let pattern = ScopePattern {
        triples,
        optional,
        filters,
    };
    Ok(GraphQuery::Delete {
        delete,
        pattern: pattern.into_group(),
    })
}

/// Whether any condition, at any depth, reads the entity itself
fn targets_subject(conditions: &[Condition]) -> bool {
    conditions.iter().any(|condition| match condition {
        Condition::Compare(filter) => filter.attribute.is_subject(),
        Condition::Columns(cmp) => cmp.left.is_subject() || cmp.right.is_subject(),
        Condition::Expression(filter) => filter
            .expr
            .operands()
            .iter()
            .any(|(_, column)| column.eq_ignore_ascii_case(SUBJECT_COLUMN)),
        Condition::Any(groups) => groups.iter().any(|group| targets_subject(group)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConverterConfig, SequentialGenerator};
    use crate::query::parse;
    use crate::schema::{EmptyCatalog, InferredCatalog};
    use crate::sparql::serialize;
    use crate::types::RdfTriple;

    fn insert(catalog: &dyn crate::schema::Catalog, sql: &str) -> Result<String> {
        let config = ConverterConfig::default();
        let resolver = HandleResolver::new(catalog, &config);
        let ids = SequentialGenerator::new();
        convert_insert(&parse(sql)?, &resolver, &ids).map(|q| serialize(&q))
    }

    fn delete(sql: &str) -> String {
        let catalog = EmptyCatalog;
        let config = ConverterConfig::default();
        let resolver = HandleResolver::new(&catalog, &config);
        serialize(&convert_delete(&parse(sql).unwrap(), &resolver).unwrap())
    }

    #[test]
    fn test_insert_literal_formatting() {
        let out = insert(
            &EmptyCatalog,
            "INSERT INTO client (name, email, age, subject) VALUES ('Bob', 'bob@example.com', 25, 'x')",
        )
        .unwrap();
        assert_eq!(
            out,
            "INSERT DATA {\n  \
             <http://example.org/client/1> rdf:type <http://example.org/types/Client> .\n  \
             <http://example.org/client/1> <http://example.org/ontology/name> \"Bob\" .\n  \
             <http://example.org/client/1> <http://example.org/ontology/email> \"bob@example.com\" .\n  \
             <http://example.org/client/1> <http://example.org/ontology/age> 25 .\n\
             }"
        );
    }

    #[test]
    fn test_insert_value_coercion() {
        let out = insert(
            &EmptyCatalog,
            "INSERT INTO item (code, home, active, note) VALUES ('42', 'http://example.org/x', TRUE, NULL)",
        )
        .unwrap();
        assert!(out.contains("<http://example.org/ontology/code> 42 ."));
        assert!(out.contains("<http://example.org/ontology/home> <http://example.org/x> ."));
        assert!(out.contains("<http://example.org/ontology/active> true ."));
        assert!(!out.contains("note"));

        let out = insert(&EmptyCatalog, "INSERT INTO item (code, size) VALUES ('1.', 2.)").unwrap();
        assert!(out.contains("<http://example.org/ontology/code> \"1.\" ."));
        assert!(out.contains("<http://example.org/ontology/size> 2.0 ."));
    }

    #[test]
    fn test_insert_rows_get_distinct_entities() {
        let out = insert(&EmptyCatalog, "INSERT INTO client (name) VALUES ('A'), ('B')").unwrap();
        assert!(out.contains("<http://example.org/client/1> <http://example.org/ontology/name> \"A\""));
        assert!(out.contains("<http://example.org/client/2> <http://example.org/ontology/name> \"B\""));
    }

    #[test]
    fn test_positional_insert_uses_catalog_columns() {
        let triples = vec![
            RdfTriple::new("http://example.org/client/9", crate::types::RDF_TYPE, "http://example.org/types/Client"),
            RdfTriple::new("http://example.org/client/9", "http://example.org/ontology/name", "Ann"),
        ];
        let catalog = InferredCatalog::infer(&triples);
        let out = insert(&catalog, "INSERT INTO client VALUES ('Bob')").unwrap();
        assert!(out.contains("<http://example.org/ontology/name> \"Bob\""));

        match insert(&catalog, "INSERT INTO client VALUES ('Bob', 3)") {
            Err(Error::Syntax { .. }) => {}
            other => panic!("Expected Syntax error, got {:?}", other),
        }
        match insert(&EmptyCatalog, "INSERT INTO client VALUES ('Bob')") {
            Err(Error::Syntax { .. }) => {}
            other => panic!("Expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_without_filter() {
        assert_eq!(
            delete("DELETE FROM client"),
            "DELETE {\n  ?s0 ?p ?o .\n  ?s0 rdf:type <http://example.org/types/Client> .\n}\n\
             WHERE {\n  ?s0 rdf:type <http://example.org/types/Client> .\n  ?s0 ?p ?o .\n}"
        );
    }

    #[test]
    fn test_delete_by_subject_removes_whole_entity() {
        assert_eq!(
            delete("DELETE FROM client WHERE subject = 'http://example.org/client/1'"),
            "DELETE {\n  ?s0 ?p ?o .\n  ?s0 rdf:type <http://example.org/types/Client> .\n}\n\
             WHERE {\n  ?s0 rdf:type <http://example.org/types/Client> .\n  ?s0 ?p ?o .\n  \
             FILTER(?s0 = <http://example.org/client/1>)\n}"
        );
    }

    #[test]
    fn test_delete_by_subject_and_property() {
        let out = delete("DELETE FROM client WHERE subject = 'http://example.org/client/1' AND age < 18");
        let (template, guard) = out.split_once("WHERE").unwrap();
        assert!(template.contains("?s0 ?p ?o ."));
        assert!(template.contains("?s0 <http://example.org/ontology/age> ?age ."));
        assert!(template.contains("?s0 rdf:type <http://example.org/types/Client> ."));
        assert!(guard.contains("?s0 ?p ?o ."));
        assert!(guard.contains("?s0 <http://example.org/ontology/age> ?age ."));
        assert!(guard.contains("FILTER(?s0 = <http://example.org/client/1>)"));
        assert!(guard.contains("FILTER(?age < 18)"));
    }

    #[test]
    fn test_delete_wildcard_avoids_column_names() {
        let out = delete("DELETE FROM point WHERE subject = 'http://example.org/point/1' AND p > 0");
        assert!(out.contains("?s0 <http://example.org/ontology/p> ?p ."));
        assert!(out.contains("?s0 ?p_2 ?o ."));
    }

    #[test]
    fn test_delete_with_filter() {
        let out = delete("DELETE FROM client WHERE age < 18");
        assert_eq!(
            out,
            "DELETE {\n  ?s0 <http://example.org/ontology/age> ?age .\n  ?s0 rdf:type <http://example.org/types/Client> .\n}\n\
             WHERE {\n  ?s0 rdf:type <http://example.org/types/Client> .\n  ?s0 <http://example.org/ontology/age> ?age .\n  FILTER(?age < 18)\n}"
        );
    }
}
