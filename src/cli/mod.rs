//! 命令行支持模块
//!
//! 目录加载、语句切分、结果打印与补全，供 relgraph-cli / relgraph-schema 共用

pub mod commands;
pub mod completer;
pub mod printer;

pub use commands::{execute_console_command, is_console_command, CommandResult, ConsoleState};
pub use completer::SqlCompleter;
pub use printer::{check_vertical_display, PrintMode, Printer};

use crate::error::{Error, Result};
use crate::import::TripleImporter;
use crate::schema::{Catalog, EmptyCatalog, InferredCatalog, MappedCatalog};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Where the catalog comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource<'a> {
    /// Triple file to infer from
    Data(&'a Path),
    /// Inferred catalog saved as JSON
    Inferred(&'a Path),
    /// Dataset mapping JSON
    Mapping(&'a Path),
    None,
}

pub fn load_catalog(source: CatalogSource<'_>) -> Result<Arc<dyn Catalog>> {
    match source {
        CatalogSource::Data(path) => Ok(Arc::new(infer_from_file(path)?)),
        CatalogSource::Inferred(path) => Ok(Arc::new(InferredCatalog::load(path)?)),
        CatalogSource::Mapping(path) => Ok(Arc::new(MappedCatalog::load(path)?)),
        CatalogSource::None => {
            warn!("no catalog given, every name uses the default namespaces");
            Ok(Arc::new(EmptyCatalog))
        }
    }
}

/// Load a triple file and infer its catalog
pub fn infer_from_file(path: &Path) -> Result<InferredCatalog> {
    let (triples, stats) = TripleImporter::new().import_file(path)?;
    if triples.is_empty() {
        return Err(Error::Import(format!("文件中没有可用的三元组: {}", path.display())));
    }
    let catalog = InferredCatalog::infer(&triples);
    info!(
        tables = catalog.tables().count(),
        triples = stats.triples_read,
        skipped = stats.errors,
        "catalog inferred"
    );
    Ok(catalog)
}

/// Split a script on `;` outside quotes and comments. Empty statements are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    // 行注释
                    for next in chars.by_ref() {
                        if next == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                ';' => {
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_split_statements() {
        let script = "SELECT name FROM client WHERE note = 'a;b';\n\
                      -- skipped; comment\n\
                      DELETE FROM client;;\n  ";
        assert_eq!(
            split_statements(script),
            vec![
                "SELECT name FROM client WHERE note = 'a;b'".to_string(),
                "DELETE FROM client".to_string()
            ]
        );
        assert!(split_statements(" ; ").is_empty());
    }

    #[test]
    fn test_load_catalog_from_data() {
        let mut file = Builder::new().suffix(".nt").tempfile().unwrap();
        writeln!(
            file,
            "<http://example.org/p/1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/types/Product> ."
        )
        .unwrap();
        writeln!(file, "<http://example.org/p/1> <http://example.org/ontology/price> \"9\" .").unwrap();

        let catalog = load_catalog(CatalogSource::Data(file.path())).unwrap();
        assert_eq!(catalog.table_names(), vec!["product".to_string()]);
        assert!(catalog.validate("product", "price"));
    }

    #[test]
    fn test_empty_data_file_is_an_error() {
        let file = Builder::new().suffix(".nt").tempfile().unwrap();
        match load_catalog(CatalogSource::Data(file.path())) {
            Err(Error::Import(_)) => {}
            Err(e) => panic!("Expected Import error, got {:?}", e),
            Ok(_) => panic!("Expected Import error"),
        }
    }
}
