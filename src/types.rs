//! RDF 术语类型和通用类型定义
//!
//! Every slot of an emitted triple pattern is a [`Term`]. Rendering through
//! `Display` is the only place where a term is flattened back to text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `rdf:` namespace
pub const RDF_NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// `rdf:type`
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Catch-all type for subjects without any asserted type
pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";

/// Graph-pattern variable (stored without the leading `?`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.strip_prefix('?') {
            Some(stripped) => Variable(stripped.to_string()),
            None => Variable(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// Absolute IRI, used for type handles, predicate handles and entity identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Iri(String);

impl Iri {
    pub fn new(iri: impl Into<String>) -> Self {
        let iri = iri.into();
        let trimmed = iri
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .map(str::to_string);
        Iri(trimmed.unwrap_or(iri))
    }

    pub fn rdf_type() -> Self {
        Iri(RDF_TYPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_rdf_type(&self) -> bool {
        self.0 == RDF_TYPE
    }

    /// Lexical local name: the part after the last `#` or `/`.
    pub fn local_name(&self) -> &str {
        local_name(&self.0)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rdf_type() {
            write!(f, "rdf:type")
        } else {
            write!(f, "<{}>", self.0)
        }
    }
}

/// Extract the local name of an IRI string.
///
/// Purely lexical: the substring after the last `#`, else after the last `/`.
/// A trailing separator is ignored so `http://ex.org/Thing/` still yields `Thing`.
pub fn local_name(iri: &str) -> &str {
    let trimmed = iri.trim_end_matches(['#', '/']);
    if let Some(idx) = trimmed.rfind('#') {
        &trimmed[idx + 1..]
    } else if let Some(idx) = trimmed.rfind('/') {
        &trimmed[idx + 1..]
    } else {
        trimmed
    }
}

/// Whether a string looks like an absolute IRI (scheme prefix).
pub fn is_iri_like(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    if lower.starts_with("urn:") || lower.starts_with("mailto:") {
        return true;
    }
    match lower.find("://") {
        Some(idx) if idx > 0 => lower[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        _ => false,
    }
}

/// Whether a string is a plain decimal number (optional sign, fraction, exponent).
pub fn looks_numeric(s: &str) -> bool {
    let s = s.trim();
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    if body.is_empty() {
        return false;
    }
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let mut parts = mantissa.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    let int_ok = int_part.chars().all(|c| c.is_ascii_digit());
    // a fraction needs digits unless an exponent follows (`1.` is not a number, `1.e5` is)
    let frac_ok = frac_part.map_or(true, |f| {
        (!f.is_empty() || exponent.is_some()) && f.chars().all(|c| c.is_ascii_digit())
    });
    let has_digits = !int_part.is_empty() || frac_part.map_or(false, |f| !f.is_empty());
    let exp_ok = exponent.map_or(true, |e| {
        let e = e.strip_prefix(['-', '+']).unwrap_or(e);
        !e.is_empty() && e.chars().all(|c| c.is_ascii_digit())
    });
    int_ok && frac_ok && has_digits && exp_ok
}

/// RDF literal as it appears in an emitted pattern or filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    /// Quoted string literal
    String(String),
    /// Bare numeric literal, kept in its source spelling
    Number(String),
    /// `true` / `false`
    Boolean(bool),
}

impl Literal {
    pub fn string(s: impl Into<String>) -> Self {
        Literal::String(s.into())
    }

    pub fn number(s: impl Into<String>) -> Self {
        Literal::Number(s.into())
    }
}

/// Escape a string for use inside a double-quoted SPARQL literal.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// One slot of a triple pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    Variable(Variable),
    Iri(Iri),
    Literal(Literal),
}

impl Term {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Term::Variable(v)
    }
}

impl From<Iri> for Term {
    fn from(i: Iri) -> Self {
        Term::Iri(i)
    }
}

impl From<Literal> for Term {
    fn from(l: Literal) -> Self {
        Term::Literal(l)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => v.fmt(f),
            Term::Iri(i) => i.fmt(f),
            Term::Literal(l) => l.fmt(f),
        }
    }
}

/// One statement of loaded graph data. IRIs are stored without angle brackets;
/// literal objects keep their lexical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RdfTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl RdfTriple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub fn is_type_assertion(&self) -> bool {
        self.predicate == RDF_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://example.org/types/Client"), "Client");
        assert_eq!(local_name("http://xmlns.com/foaf/0.1/#name"), "name");
        assert_eq!(local_name("http://example.org/types/Thing/"), "Thing");
        assert_eq!(local_name("plain"), "plain");
    }

    #[test]
    fn test_term_rendering() {
        assert_eq!(Variable::new("?s0").to_string(), "?s0");
        assert_eq!(Iri::rdf_type().to_string(), "rdf:type");
        assert_eq!(
            Iri::new("<http://example.org/ontology/name>").to_string(),
            "<http://example.org/ontology/name>"
        );
        assert_eq!(Literal::string("say \"hi\"\n").to_string(), r#""say \"hi\"\n""#);
        assert_eq!(Literal::Boolean(true).to_string(), "true");
    }

    #[test]
    fn test_value_shape_checks() {
        assert!(looks_numeric("25"));
        assert!(looks_numeric("-19.99"));
        assert!(looks_numeric("1e5"));
        assert!(!looks_numeric("inf"));
        assert!(!looks_numeric("12a"));
        assert!(!looks_numeric("."));
        assert!(!looks_numeric("1."));
        assert!(looks_numeric(".5"));
        assert!(is_iri_like("http://example.org/x"));
        assert!(is_iri_like("urn:isbn:123"));
        assert!(!is_iri_like("bob@example.com"));
        assert!(!is_iri_like("Note: call back"));
    }
}
