//! UNION / INTERSECT / EXCEPT
//!
//! Every branch is converted on its own scope. The first branch fixes the
//! result shape; later branches are renamed onto it position by position.
//!
//! ```text
//! UNION       { A } UNION { B }
//! INTERSECT   A . FILTER EXISTS { B }
//! EXCEPT      A . FILTER NOT EXISTS { B }
//! ```

use super::convert_select;
use crate::error::{Error, Result};
use crate::query::{Combination, CombinatorKind, Query, SelectItem};
use crate::schema::HandleResolver;
use crate::sparql::{Expr, GroupPattern, OrderCondition, PatternElement, Projection, SelectQuery};
use crate::types::Variable;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

pub fn convert_combination(
    query: &Query,
    combination: &Combination,
    resolver: &HandleResolver<'_>,
) -> Result<SelectQuery> {
    let branches = flatten(combination);
    let mut converted = Vec::with_capacity(branches.len());
    for branch in &branches {
        converted.push(convert_select(branch, resolver)?);
    }

    let mut iter = converted.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::syntax("组合查询缺少分支", combination.kind.as_str().to_string()))?;
    let target: Vec<Variable> = first.projection_vars().into_iter().cloned().collect();
    let mut taken = first.variables();

    let mut rest = Vec::new();
    for (index, mut branch) in iter.enumerate() {
        let width = branch.projection.len();
        if width != target.len() {
            return Err(Error::ProjectionMismatch {
                combinator: combination.kind.as_str().to_string(),
                left: target.len(),
                right: width,
            });
        }
        let suffix = index + 2;
        let map = branch_renaming(&branch, &target, &taken, combination.kind, suffix);
        branch.rename_variables(&map);
        taken.extend(branch.variables());
        rest.push(branch);
    }
    debug!(
        combinator = combination.kind.as_str(),
        branches = rest.len() + 1,
        "branches converted"
    );

    let mut pattern = GroupPattern::new();
    match combination.kind {
        CombinatorKind::Union => {
            let groups = std::iter::once(first).chain(rest).map(branch_group).collect();
            pattern.elements.push(PatternElement::Union(groups));
        }
        CombinatorKind::Intersect | CombinatorKind::Except => {
            pattern = branch_group(first);
            for branch in rest {
                pattern.elements.push(PatternElement::Exists {
                    negated: combination.kind == CombinatorKind::Except,
                    pattern: branch_group(branch),
                });
            }
        }
    }

    let names = output_names(leftmost(&branches[0]));
    let mut order_by = Vec::with_capacity(query.order_by.len());
    for item in &query.order_by {
        let attr = &item.attribute;
        if attr.aggregate.is_some() {
            return Err(Error::unsupported(format!(
                "{} 结果上的聚合排序: {}",
                combination.kind.as_str(),
                attr
            )));
        }
        let var = resolve_output(&attr.name, &names, &target).unwrap_or_else(|| {
            warn!(column = %attr.name, "ORDER BY column not in combined projection");
            Variable::new(attr.name.to_lowercase())
        });
        order_by.push(OrderCondition {
            expr: Expr::var(&var),
            descending: item.descending,
        });
    }

    Ok(SelectQuery {
        distinct: !combination.all,
        projection: target.into_iter().map(Projection::Var).collect(),
        pattern,
        order_by,
        limit: query.limit,
        offset: query.offset,
        ..SelectQuery::new()
    })
}

/// Branches of a same-kind UNION chain, left to right
fn flatten(combination: &Combination) -> Vec<&Query> {
    let mut branches = Vec::new();
    let left = combination.left.as_ref();
    match &left.combination {
        Some(inner)
            if combination.kind == CombinatorKind::Union
                && inner.kind == CombinatorKind::Union
                && inner.all == combination.all
                && left.order_by.is_empty()
                && left.limit.is_none()
                && left.offset.is_none() =>
        {
            branches.extend(flatten(inner));
        }
        _ => branches.push(left),
    }
    branches.push(combination.right.as_ref());
    branches
}

/// Projection variables onto the target shape; private variables that could
/// clash (all of them for existence filters) get a branch suffix
fn branch_renaming(
    branch: &SelectQuery,
    target: &[Variable],
    taken: &BTreeSet<Variable>,
    kind: CombinatorKind,
    suffix: usize,
) -> HashMap<Variable, Variable> {
    let mut map = HashMap::new();
    for (var, to) in branch.projection_vars().into_iter().zip(target) {
        map.entry(var.clone()).or_insert_with(|| to.clone());
    }

    let mut used: BTreeSet<Variable> = taken.iter().cloned().collect();
    used.extend(branch.variables());
    for var in branch.variables() {
        if map.contains_key(&var) {
            continue;
        }
        let clashes = match kind {
            CombinatorKind::Union => target.contains(&var),
            CombinatorKind::Intersect | CombinatorKind::Except => true,
        };
        if !clashes {
            continue;
        }
        let mut candidate = Variable::new(format!("{}_{}", var.name(), suffix));
        while used.contains(&candidate) {
            candidate = Variable::new(format!("{}_{}", candidate.name(), suffix));
        }
        used.insert(candidate.clone());
        map.insert(var, candidate);
    }
    map
}

/// A branch as a group: bare pattern when it has no solution modifiers
fn branch_group(branch: SelectQuery) -> GroupPattern {
    if branch.has_modifiers() {
        let mut group = GroupPattern::new();
        group.elements.push(PatternElement::SubSelect(Box::new(branch)));
        group
    } else {
        branch.pattern
    }
}

fn leftmost(query: &Query) -> &Query {
    match &query.combination {
        Some(c) => leftmost(&c.left),
        None => query,
    }
}

/// Output column names of a branch, by position
fn output_names(query: &Query) -> Vec<Option<String>> {
    query
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::Column(attr) => Some(attr.alias.clone().unwrap_or_else(|| attr.name.clone())),
            SelectItem::Computed { alias, .. } => alias.clone(),
        })
        .collect()
}

fn resolve_output(name: &str, names: &[Option<String>], target: &[Variable]) -> Option<Variable> {
    if let Some(var) = target.iter().find(|v| v.name().eq_ignore_ascii_case(name)) {
        return Some(var.clone());
    }
    names
        .iter()
        .position(|n| n.as_deref().map_or(false, |n| n.eq_ignore_ascii_case(name)))
        .and_then(|i| target.get(i).cloned())
}

#[cfg(test)]
mod tests {
    use crate::convert::Converter;
    use crate::error::Error;
    use crate::schema::EmptyCatalog;
    use std::sync::Arc;

    fn convert(sql: &str) -> Result<String, Error> {
        Converter::new(Arc::new(EmptyCatalog)).convert(sql)
    }

    #[test]
    fn test_union_shares_projection_and_limit() {
        let out = convert("SELECT name FROM client UNION SELECT name FROM product LIMIT 10").unwrap();
        assert_eq!(
            out,
            "SELECT DISTINCT ?name\nWHERE {\n  {\n    ?s0 <http://example.org/ontology/name> ?name .\n  }\n  UNION\n  {\n    ?s0 <http://example.org/ontology/name> ?name .\n  }\n}\nLIMIT 10"
        );
        assert_eq!(out.matches("LIMIT").count(), 1);
    }

    #[test]
    fn test_union_all_renames_positionally() {
        let out = convert("SELECT name FROM client UNION ALL SELECT title FROM product").unwrap();
        assert!(out.starts_with("SELECT ?name\n"));
        assert!(out.contains("<http://example.org/ontology/title> ?name ."));
        assert!(!out.contains("?title"));
    }

    #[test]
    fn test_union_chain_flattens() {
        let out = convert("SELECT name FROM a UNION SELECT name FROM b UNION SELECT name FROM c").unwrap();
        assert_eq!(out.matches("UNION").count(), 2);
        assert_eq!(out.matches("WHERE").count(), 1);
    }

    #[test]
    fn test_except_correlates_on_projection() {
        let out = convert(
            "SELECT name FROM client EXCEPT SELECT name FROM client WHERE age < 18",
        )
        .unwrap();
        assert_eq!(
            out,
            "SELECT DISTINCT ?name\nWHERE {\n  ?s0 <http://example.org/ontology/name> ?name .\n  FILTER NOT EXISTS {\n    ?s0_2 <http://example.org/ontology/name> ?name .\n    ?s0_2 <http://example.org/ontology/age> ?age_2 .\n    FILTER(?age_2 < 18)\n  }\n}"
        );
    }

    #[test]
    fn test_intersect_with_aggregating_branch_is_subselect() {
        let out = convert(
            "SELECT category FROM product INTERSECT SELECT category FROM product GROUP BY category HAVING COUNT(*) > 2",
        )
        .unwrap();
        assert!(out.contains("FILTER EXISTS {\n    SELECT ?category\n"));
        assert!(out.contains("GROUP BY ?category"));
    }

    #[test]
    fn test_outer_order_by_uses_left_names() {
        let out = convert(
            "SELECT name AS label FROM client UNION SELECT title FROM product ORDER BY label DESC",
        )
        .unwrap();
        assert!(out.ends_with("ORDER BY DESC(?label)"));
    }

    #[test]
    fn test_width_mismatch() {
        match convert("SELECT name, age FROM client UNION SELECT name FROM product") {
            Err(Error::ProjectionMismatch { combinator, left, right }) => {
                assert_eq!(combinator, "UNION");
                assert_eq!((left, right), (2, 1));
            }
            other => panic!("Expected ProjectionMismatch, got {:?}", other),
        }
    }
}
