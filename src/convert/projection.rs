//! Projection converter
//!
//! Each projected column becomes a variable: the subject variable for
//! `subject` (with its type triple), otherwise an object variable bound by a
//! property triple. Aggregates and calculated columns become `(expr AS ?alias)`.

use super::bindings::AliasBinding;
use super::scope::{QueryScope, Relation};
use crate::error::{Error, Result};
use crate::query::{Attribute, SelectItem};
use crate::sparql::{Expr, Projection};
use crate::types::Variable;
use tracing::debug;

impl<'a> QueryScope<'a> {
    pub fn convert_projection(&mut self) -> Result<Vec<Projection>> {
        let items = self.projection_items()?;
        let mut projection = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let converted = match item {
                SelectItem::Column(attr) if attr.aggregate.is_some() => self.project_aggregate(attr)?,
                SelectItem::Column(attr) => self.project_column(attr)?,
                SelectItem::Computed { expr, alias } => {
                    let rendered = self.render_expression(expr)?;
                    let name = alias.clone().unwrap_or_else(|| format!("calc_{}", index + 1));
                    let var = self.ctx.fresh(&name);
                    self.ctx.register_alias(
                        &name,
                        AliasBinding {
                            var: var.clone(),
                            base: None,
                            aggregate: None,
                            distinct: false,
                        },
                    );
                    Projection::Bind {
                        expr: Expr::Raw(rendered),
                        alias: var,
                    }
                }
            };
            projection.push(converted);
        }
        debug!(
            vars = ?projection.iter().map(|p| p.variable().to_string()).collect::<Vec<_>>(),
            "projection converted"
        );
        Ok(projection)
    }

    /// Projection items, with `SELECT *` expanded from the catalog
    fn projection_items(&self) -> Result<Vec<SelectItem>> {
        if !self.query.select_all {
            return Ok(self.query.projection.clone());
        }
        let table = match self.query.from.as_slice() {
            [table] => table,
            _ => return Err(Error::unsupported("多表 SELECT *")),
        };
        let columns = self
            .resolver
            .columns(&table.name)
            .ok_or_else(|| Error::syntax("SELECT * 需要目录中已知的表", table.name.clone()))?;
        Ok(columns
            .into_iter()
            .map(|col| SelectItem::Column(Attribute::new(table.binding_name(), col)))
            .collect())
    }

    fn project_column(&mut self, attr: &Attribute) -> Result<Projection> {
        let var = if attr.is_subject() {
            let relation = self.relation_for(attr)?;
            self.ensure_typed(&relation)?
        } else {
            self.attribute_var(attr)?
        };
        match &attr.alias {
            Some(alias) => {
                let alias_var = self.ctx.fresh(alias);
                self.ctx.register_alias(
                    alias,
                    AliasBinding {
                        var: alias_var.clone(),
                        base: Some(var.clone()),
                        aggregate: None,
                        distinct: false,
                    },
                );
                Ok(Projection::Bind {
                    expr: Expr::var(&var),
                    alias: alias_var,
                })
            }
            None => Ok(Projection::Var(var)),
        }
    }

    fn project_aggregate(&mut self, attr: &Attribute) -> Result<Projection> {
        let function = match attr.aggregate {
            Some(f) => f,
            None => return self.project_column(attr),
        };
        let base = self.aggregate_base(attr)?;
        let default_name = if attr.is_star() {
            "count".to_string()
        } else {
            format!("{}_{}", function.as_str().to_lowercase(), attr.name)
        };
        let name = attr.alias.clone().unwrap_or(default_name);
        let alias = self.ctx.fresh(&name);
        self.ctx.register_alias(
            &name,
            AliasBinding {
                var: alias.clone(),
                base: base.clone(),
                aggregate: Some(function),
                distinct: attr.distinct,
            },
        );
        Ok(Projection::Bind {
            expr: Expr::Aggregate {
                function,
                distinct: attr.distinct,
                arg: base.map(|v| Box::new(Expr::var(&v))),
            },
            alias,
        })
    }

    /// Variable an aggregate ranges over; `None` for `*`.
    /// `COUNT(*)` still needs the relation in the pattern.
    pub(super) fn aggregate_base(&mut self, attr: &Attribute) -> Result<Option<Variable>> {
        if attr.is_star() {
            let query = self.query;
            for table in &query.from {
                if self.ctx.existing_subject(table.binding_name()).is_none() {
                    self.subject_of(&Relation::from(table));
                }
            }
            return Ok(None);
        }
        if attr.is_subject() {
            let relation = self.relation_for(attr)?;
            return Ok(Some(self.ensure_typed(&relation)?));
        }
        Ok(Some(self.attribute_var(attr)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use crate::query::parse;
    use crate::schema::{EmptyCatalog, HandleResolver, InferredCatalog};
    use crate::types::RdfTriple;

    fn project(sql: &str) -> (Vec<String>, usize) {
        let catalog = EmptyCatalog;
        let config = ConverterConfig::default();
        let resolver = HandleResolver::new(&catalog, &config);
        let query = parse(sql).unwrap();
        let mut scope = QueryScope::new(&query, &resolver);
        let projection = scope.convert_projection().unwrap();
        let triples = scope.context().triples().len();
        (projection.iter().map(|p| p.to_string()).collect(), triples)
    }

    #[test]
    fn test_plain_columns_keep_order() {
        let (vars, triples) = project("SELECT name, email, age FROM client");
        assert_eq!(vars, vec!["?name", "?email", "?age"]);
        assert_eq!(triples, 3);
    }

    #[test]
    fn test_subject_projection_types_once() {
        let (vars, triples) = project("SELECT subject, client.subject FROM client");
        assert_eq!(vars, vec!["?s0", "?s0"]);
        assert_eq!(triples, 1);
    }

    #[test]
    fn test_aggregate_aliases() {
        let (vars, _) = project("SELECT category, COUNT(name), AVG(price) AS avg_price, COUNT(*) FROM product");
        assert_eq!(
            vars,
            vec![
                "?category",
                "(COUNT(?name) AS ?count_name)",
                "(AVG(?price) AS ?avg_price)",
                "(COUNT(*) AS ?count)"
            ]
        );
    }

    #[test]
    fn test_calculated_column() {
        let (vars, triples) = project("SELECT name, price * stock AS value, price + 1 FROM product");
        assert_eq!(vars[1], "((?price * ?stock) AS ?value)");
        assert_eq!(vars[2], "((?price + 1) AS ?calc_3)");
        assert_eq!(triples, 3);
    }

    #[test]
    fn test_select_star_expands_catalog_columns() {
        let triples = vec![
            RdfTriple::new("http://example.org/client/1", crate::types::RDF_TYPE, "http://example.org/types/Client"),
            RdfTriple::new("http://example.org/client/1", "http://example.org/ontology/name", "Bob"),
        ];
        let catalog = InferredCatalog::infer(&triples);
        let config = ConverterConfig::default();
        let resolver = HandleResolver::new(&catalog, &config);
        let query = parse("SELECT * FROM client").unwrap();
        let mut scope = QueryScope::new(&query, &resolver);
        let vars: Vec<String> = scope
            .convert_projection()
            .unwrap()
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(vars, vec!["?s0", "?name"]);

        let unknown = parse("SELECT * FROM nothing").unwrap();
        let mut scope = QueryScope::new(&unknown, &resolver);
        assert!(matches!(scope.convert_projection(), Err(Error::Syntax { .. })));
    }
}
