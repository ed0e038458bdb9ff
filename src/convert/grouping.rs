//! GROUP BY / HAVING / ORDER BY converter
//!
//! Grouping keys reuse the variables the projection bound, so the grouped
//! column and the displayed column stay one variable. HAVING always
//! recomputes its aggregate over the base variable, never over the projected
//! `(FUNC(..) AS ?alias)` binding.

use super::operators::translate;
use super::scope::QueryScope;
use crate::error::Result;
use crate::query::{AggregateFunction, Attribute};
use crate::sparql::{Expr, OrderCondition};
use crate::types::Variable;

impl<'a> QueryScope<'a> {
    pub fn convert_group_by(&mut self) -> Result<Vec<Variable>> {
        let query = self.query;
        let mut vars: Vec<Variable> = Vec::with_capacity(query.group_by.len());
        for attr in &query.group_by {
            let var = match self.plain_alias(attr) {
                Some(var) => var,
                None => self.column_var(attr)?,
            };
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        Ok(vars)
    }

    pub fn convert_having(&mut self) -> Result<Vec<Expr>> {
        let query = self.query;
        let mut conditions = Vec::with_capacity(query.having.len());
        for filter in &query.having {
            let target = self.having_target(&filter.attribute)?;
            conditions.push(translate(target, filter.op, &filter.value, false)?);
        }
        Ok(conditions)
    }

    pub fn convert_order_by(&mut self) -> Result<Vec<OrderCondition>> {
        let query = self.query;
        let mut keys = Vec::with_capacity(query.order_by.len());
        for item in &query.order_by {
            let attr = &item.attribute;
            let expr = match attr.aggregate {
                Some(function) => match self.projected_aggregate(attr, function) {
                    Some(alias) => Expr::var(&alias),
                    None => self.aggregate_expr(attr, function)?,
                },
                None => match self.alias_var(attr) {
                    Some(var) => Expr::var(&var),
                    None => Expr::var(&self.column_var(attr)?),
                },
            };
            keys.push(OrderCondition {
                expr,
                descending: item.descending,
            });
        }
        Ok(keys)
    }

    /// Condition target for HAVING: a recomputed aggregate, or a plain grouped value
    fn having_target(&mut self, attr: &Attribute) -> Result<Expr> {
        if let Some(function) = attr.aggregate {
            return self.aggregate_expr(attr, function);
        }
        if !attr.is_qualified() {
            if let Some(binding) = self.ctx.alias(&attr.name).cloned() {
                if let Some(function) = binding.aggregate {
                    return Ok(Expr::Aggregate {
                        function,
                        distinct: binding.distinct,
                        arg: binding.base.map(|v| Box::new(Expr::var(&v))),
                    });
                }
                return Ok(Expr::var(binding.base.as_ref().unwrap_or(&binding.var)));
            }
        }
        Ok(Expr::var(&self.column_var(attr)?))
    }

    fn aggregate_expr(&mut self, attr: &Attribute, function: AggregateFunction) -> Result<Expr> {
        let base = self.aggregate_base(attr)?;
        Ok(Expr::Aggregate {
            function,
            distinct: attr.distinct,
            arg: base.map(|v| Box::new(Expr::var(&v))),
        })
    }

    /// Alias variable of a projected aggregate with the same function and argument
    fn projected_aggregate(&mut self, attr: &Attribute, function: AggregateFunction) -> Option<Variable> {
        let base = if attr.is_star() {
            None
        } else {
            let relation = self.relation_for(attr).ok()?;
            if attr.is_subject() {
                Some(self.ctx.existing_subject(&relation.key)?.clone())
            } else {
                Some(self.ctx.object(&relation.key, &attr.name)?.clone())
            }
        };
        self.query.projection.iter().find_map(|item| match item {
            crate::query::SelectItem::Column(projected)
                if projected.aggregate == Some(function) && projected.distinct == attr.distinct =>
            {
                let name = projected
                    .alias
                    .clone()
                    .unwrap_or_else(|| default_aggregate_name(projected));
                let binding = self.ctx.alias(&name)?;
                (binding.base == base).then(|| binding.var.clone())
            }
            _ => None,
        })
    }

    /// Alias variable for an unqualified name
    fn alias_var(&self, attr: &Attribute) -> Option<Variable> {
        if attr.is_qualified() {
            return None;
        }
        self.ctx.alias(&attr.name).map(|b| b.var.clone())
    }

    /// Alias of a non-aggregate projection, resolved to its base variable
    fn plain_alias(&self, attr: &Attribute) -> Option<Variable> {
        if attr.is_qualified() {
            return None;
        }
        let binding = self.ctx.alias(&attr.name)?;
        if binding.aggregate.is_some() {
            return None;
        }
        Some(binding.base.clone().unwrap_or_else(|| binding.var.clone()))
    }

    /// Subject variable or (reused) object variable of a plain column
    fn column_var(&mut self, attr: &Attribute) -> Result<Variable> {
        if attr.is_subject() {
            let relation = self.relation_for(attr)?;
            return self.ensure_typed(&relation);
        }
        self.attribute_var(attr)
    }
}

fn default_aggregate_name(attr: &Attribute) -> String {
    match attr.aggregate {
        Some(_) if attr.is_star() => "count".to_string(),
        Some(function) => format!("{}_{}", function.as_str().to_lowercase(), attr.name),
        None => attr.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfig;
    use crate::query::parse;
    use crate::schema::{EmptyCatalog, HandleResolver};
    use crate::sparql::Projection;

    struct Converted {
        projection: Vec<Projection>,
        group_by: Vec<Variable>,
        having: Vec<String>,
        order_by: Vec<String>,
        triples: usize,
    }

    fn convert(sql: &str) -> Converted {
        let catalog = EmptyCatalog;
        let config = ConverterConfig::default();
        let resolver = HandleResolver::new(&catalog, &config);
        let query = parse(sql).unwrap();
        let mut scope = QueryScope::new(&query, &resolver);
        let projection = scope.convert_projection().unwrap();
        let group_by = scope.convert_group_by().unwrap();
        let having = scope.convert_having().unwrap();
        let order_by = scope.convert_order_by().unwrap();
        Converted {
            projection,
            group_by,
            having: having.iter().map(|e| e.to_string()).collect(),
            order_by: order_by.iter().map(|o| o.to_string()).collect(),
            triples: scope.context().triples().len(),
        }
    }

    #[test]
    fn test_group_key_is_projection_variable() {
        let result = convert("SELECT category, COUNT(name) FROM product GROUP BY category");
        assert_eq!(result.group_by.len(), 1);
        assert_eq!(result.projection[0].variable(), &result.group_by[0]);
        assert_eq!(result.triples, 2);
    }

    #[test]
    fn test_group_by_alias_and_unprojected_column() {
        let result = convert("SELECT category AS cat, COUNT(*) FROM product GROUP BY cat, brand");
        assert_eq!(result.group_by[0].name(), "category");
        assert_eq!(result.group_by[1].name(), "brand");
        assert_eq!(result.triples, 2);
    }

    #[test]
    fn test_having_recomputes_aggregate() {
        let result = convert(
            "SELECT category, COUNT(name) AS cnt FROM product GROUP BY category HAVING cnt > 2 AND AVG(price) < 100",
        );
        assert_eq!(result.having, vec!["COUNT(?name) > 2", "AVG(?price) < 100"]);
    }

    #[test]
    fn test_order_by_alias_and_aggregate() {
        let result = convert(
            "SELECT category, COUNT(name) AS cnt FROM product GROUP BY category ORDER BY cnt DESC, COUNT(name), category",
        );
        assert_eq!(result.order_by, vec!["DESC(?cnt)", "ASC(?cnt)", "ASC(?category)"]);
    }

    #[test]
    fn test_order_by_unprojected_aggregate() {
        let result = convert("SELECT category FROM product GROUP BY category ORDER BY SUM(stock) DESC");
        assert_eq!(result.order_by, vec!["DESC(SUM(?stock))"]);
    }
}
