//! SQL comparison operators to SPARQL filter expressions
//!
//! | SQL                    | SPARQL                              |
//! |------------------------|-------------------------------------|
//! | `= != < > <= >=`       | same operator                       |
//! | `LIKE 'pat'`           | `regex(var, "pat", "i")`            |
//! | `IN (a, b)`            | `var IN (a, b)`                     |
//! | `BETWEEN a AND b`      | `var >= a && var <= b`              |

use crate::error::{Error, Result};
use crate::query::{CompareOp, Value};
use crate::sparql::Expr;
use crate::types::{is_iri_like, Iri, Literal, Term};

/// `%` -> `.*`, `_` -> `.`
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            _ => out.push(c),
        }
    }
    out
}

/// Scalar value as a filter operand. IRI-shaped strings become IRIs when
/// compared against a subject.
pub fn value_expr(value: &Value, subject: bool) -> Result<Expr> {
    let term: Term = match value {
        Value::String(s) if subject && is_iri_like(s) => Iri::new(s.as_str()).into(),
        Value::String(s) => Literal::string(s.as_str()).into(),
        Value::Number(n) => Literal::number(n.as_str()).into(),
        Value::Boolean(b) => Literal::Boolean(*b).into(),
        Value::Null => return Err(Error::unsupported("NULL 比较")),
        Value::List(_) | Value::Range(_, _) => {
            return Err(Error::syntax("此处需要单个常量", format!("{:?}", value)))
        }
    };
    Ok(Expr::Term(term))
}

/// Build the filter expression for `target OP value`
pub fn translate(target: Expr, op: CompareOp, value: &Value, subject: bool) -> Result<Expr> {
    match op {
        CompareOp::Like => match value {
            Value::String(pattern) => {
                let target = if subject {
                    Expr::Raw(format!("STR({})", target))
                } else {
                    target
                };
                Ok(Expr::Regex {
                    target: Box::new(target),
                    pattern: like_to_regex(pattern),
                    case_insensitive: true,
                })
            }
            _ => Err(Error::syntax("LIKE 需要字符串模式", format!("{:?}", value))),
        },
        CompareOp::In => match value {
            Value::List(items) => {
                let values = items
                    .iter()
                    .map(|v| value_expr(v, subject))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::In {
                    target: Box::new(target),
                    values,
                })
            }
            _ => Err(Error::syntax("IN 需要值列表", format!("{:?}", value))),
        },
        CompareOp::Between => match value {
            Value::Range(low, high) => Ok(Expr::And(vec![
                Expr::compare(">=", target.clone(), value_expr(low, subject)?),
                Expr::compare("<=", target, value_expr(high, subject)?),
            ])),
            _ => Err(Error::syntax("BETWEEN 需要上下界", format!("{:?}", value))),
        },
        _ => Ok(Expr::compare(op.symbol(), target, value_expr(value, subject)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Variable;

    fn var(name: &str) -> Expr {
        Expr::var(&Variable::new(name))
    }

    #[test]
    fn test_between() {
        let value = Value::Range(
            Box::new(Value::Number("50".into())),
            Box::new(Value::Number("300".into())),
        );
        let expr = translate(var("price"), CompareOp::Between, &value, false).unwrap();
        assert_eq!(expr.to_string(), "?price >= 50 && ?price <= 300");
    }

    #[test]
    fn test_like() {
        let value = Value::String("%example.com".into());
        let expr = translate(var("email"), CompareOp::Like, &value, false).unwrap();
        assert_eq!(expr.to_string(), r#"regex(?email, ".*example.com", "i")"#);
        assert_eq!(like_to_regex("A_b%"), "A.b.*");
    }

    #[test]
    fn test_in_quotes_strings() {
        let value = Value::List(vec![
            Value::String("Electronics".into()),
            Value::String("Furniture".into()),
        ]);
        let expr = translate(var("category"), CompareOp::In, &value, false).unwrap();
        assert_eq!(
            expr.to_string(),
            r#"?category IN ("Electronics", "Furniture")"#
        );
    }

    #[test]
    fn test_scalar_comparisons() {
        let cases = [
            (CompareOp::Ne, Value::String("x".into()), r#"?v != "x""#),
            (CompareOp::Le, Value::Number("-2.5".into()), "?v <= -2.5"),
            (CompareOp::Eq, Value::Boolean(true), "?v = true"),
        ];
        for (op, value, expected) in cases {
            assert_eq!(translate(var("v"), op, &value, false).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn test_subject_values() {
        let iri = Value::String("http://example.org/client/7".into());
        let expr = translate(var("s0"), CompareOp::Eq, &iri, true).unwrap();
        assert_eq!(expr.to_string(), "?s0 = <http://example.org/client/7>");

        let pattern = Value::String("%/client/%".into());
        let expr = translate(var("s0"), CompareOp::Like, &pattern, true).unwrap();
        assert_eq!(expr.to_string(), r#"regex(STR(?s0), ".*/client/.*", "i")"#);
    }

    #[test]
    fn test_null_rejected() {
        assert!(matches!(
            translate(var("v"), CompareOp::Eq, &Value::Null, false),
            Err(Error::UnsupportedConstruct(_))
        ));
    }
}
