//! SPARQL text rendering
//!
//! Clause order is fixed: projection, pattern block (triples, `OPTIONAL`
//! blocks, then filters), GROUP BY, HAVING, ORDER BY, LIMIT, OFFSET.

use super::model::{GraphQuery, GroupPattern, PatternElement, SelectQuery, TriplePattern};
use crate::types::RDF_NAMESPACE;

const INDENT: &str = "  ";

/// Renders [`GraphQuery`] values to canonical text
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer {
    emit_prefixes: bool,
}

impl Serializer {
    pub fn new(emit_prefixes: bool) -> Self {
        Self { emit_prefixes }
    }

    pub fn serialize(&self, query: &GraphQuery) -> String {
        let mut writer = Writer::default();
        if self.emit_prefixes && query.uses_rdf_type() {
            writer.line(&format!("PREFIX rdf: <{}>", RDF_NAMESPACE));
        }
        match query {
            GraphQuery::Select(select) => writer.select(select),
            GraphQuery::InsertData(triples) => {
                writer.line("INSERT DATA {");
                writer.triples(triples);
                writer.line("}");
            }
            GraphQuery::Delete { delete, pattern } => {
                writer.line("DELETE {");
                writer.triples(delete);
                writer.line("}");
                writer.line("WHERE {");
                writer.elements(pattern);
                writer.line("}");
            }
        }
        writer.finish()
    }
}

/// Render without a prefix header
pub fn serialize(query: &GraphQuery) -> String {
    Serializer::new(false).serialize(query)
}

#[derive(Default)]
struct Writer {
    lines: Vec<String>,
    depth: usize,
}

impl Writer {
    fn line(&mut self, text: &str) {
        self.lines.push(format!("{}{}", INDENT.repeat(self.depth), text));
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }

    fn triples(&mut self, triples: &[TriplePattern]) {
        self.nested(|w| {
            for triple in triples {
                w.line(&format!("{} .", triple));
            }
        });
    }

    fn select(&mut self, query: &SelectQuery) {
        let mut head = String::from("SELECT ");
        if query.distinct {
            head.push_str("DISTINCT ");
        }
        if query.projection.is_empty() {
            head.push('*');
        } else {
            let items: Vec<String> = query.projection.iter().map(|p| p.to_string()).collect();
            head.push_str(&items.join(" "));
        }
        self.line(&head);

        self.line("WHERE {");
        self.elements(&query.pattern);
        self.line("}");

        if !query.group_by.is_empty() {
            let vars: Vec<String> = query.group_by.iter().map(|v| v.to_string()).collect();
            self.line(&format!("GROUP BY {}", vars.join(" ")));
        }
        if !query.having.is_empty() {
            let conds: Vec<String> = query.having.iter().map(|e| e.to_string()).collect();
            self.line(&format!("HAVING({})", conds.join(" && ")));
        }
        if !query.order_by.is_empty() {
            let keys: Vec<String> = query.order_by.iter().map(|o| o.to_string()).collect();
            self.line(&format!("ORDER BY {}", keys.join(" ")));
        }
        if let Some(limit) = query.limit {
            self.line(&format!("LIMIT {}", limit));
        }
        if let Some(offset) = query.offset {
            self.line(&format!("OFFSET {}", offset));
        }
    }

    /// Body of a `{ ... }` block, one level deeper than the braces
    fn elements(&mut self, pattern: &GroupPattern) {
        self.nested(|w| {
            for element in &pattern.elements {
                w.element(element);
            }
        });
    }

    fn element(&mut self, element: &PatternElement) {
        match element {
            PatternElement::Triple(triple) => self.line(&format!("{} .", triple)),
            PatternElement::Filter(expr) => self.line(&format!("FILTER({})", expr)),
            PatternElement::Optional(pattern) => {
                self.line("OPTIONAL {");
                self.elements(pattern);
                self.line("}");
            }
            PatternElement::Union(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        self.line("UNION");
                    }
                    self.group(branch);
                }
            }
            PatternElement::Exists { negated, pattern } => {
                let keyword = if *negated { "FILTER NOT EXISTS {" } else { "FILTER EXISTS {" };
                self.line(keyword);
                self.group_body(pattern);
                self.line("}");
            }
            PatternElement::SubSelect(query) => {
                self.line("{");
                self.nested(|w| w.select(query));
                self.line("}");
            }
        }
    }

    /// `{ ... }` on its own lines
    fn group(&mut self, pattern: &GroupPattern) {
        self.line("{");
        self.group_body(pattern);
        self.line("}");
    }

    /// A lone sub-select shares the enclosing braces
    fn group_body(&mut self, pattern: &GroupPattern) {
        match pattern.elements.as_slice() {
            [PatternElement::SubSelect(query)] => self.nested(|w| w.select(query)),
            _ => self.elements(pattern),
        }
    }
}
