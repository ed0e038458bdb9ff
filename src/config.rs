//! 转换器配置
//!
//! Namespaces used for lenient catalog fallbacks, strict mode, and the entity
//! identifier source used by INSERT conversion.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_TYPE_NAMESPACE: &str = "http://example.org/types/";
pub const DEFAULT_PREDICATE_NAMESPACE: &str = "http://example.org/ontology/";
pub const DEFAULT_ENTITY_NAMESPACE: &str = "http://example.org/";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Turn catalog misses and unknown functions into errors instead of fallbacks
    pub strict: bool,
    /// Namespace for type handles synthesized on a catalog miss
    pub type_namespace: String,
    /// Namespace for predicate handles synthesized on a catalog miss
    pub predicate_namespace: String,
    /// Namespace for entity identifiers minted by INSERT
    pub entity_namespace: String,
    /// Prepend `PREFIX rdf:` when the output uses `rdf:type`
    pub emit_prefixes: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            strict: false,
            type_namespace: DEFAULT_TYPE_NAMESPACE.to_string(),
            predicate_namespace: DEFAULT_PREDICATE_NAMESPACE.to_string(),
            entity_namespace: DEFAULT_ENTITY_NAMESPACE.to_string(),
            emit_prefixes: true,
        }
    }
}

impl ConverterConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("无法读取配置文件 {:?}: {}", path, e)))?;
        let config: ConverterConfig = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("解析配置文件失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, ns) in [
            ("type_namespace", &self.type_namespace),
            ("predicate_namespace", &self.predicate_namespace),
            ("entity_namespace", &self.entity_namespace),
        ] {
            if ns.is_empty() {
                return Err(Error::Config(format!("{} 不能为空", field)));
            }
            if !(ns.ends_with('/') || ns.ends_with('#')) {
                return Err(Error::Config(format!(
                    "{} 必须以 '/' 或 '#' 结尾: {}",
                    field, ns
                )));
            }
        }
        Ok(())
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Source of fresh entity identifiers for inserted rows
pub trait EntityIdGenerator: Send + Sync + fmt::Debug {
    fn next_id(&self) -> String;
}

/// Random UUID v4 identifiers
#[derive(Debug, Default)]
pub struct UuidGenerator;

impl EntityIdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Monotonic counter identifiers (`1`, `2`, ...), reproducible across runs
#[derive(Debug, Default)]
pub struct SequentialGenerator {
    next: AtomicU64,
}

impl SequentialGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.saturating_sub(1)),
        }
    }
}

impl EntityIdGenerator for SequentialGenerator {
    fn next_id(&self) -> String {
        (self.next.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

pub fn default_id_generator() -> Arc<dyn EntityIdGenerator> {
    Arc::new(UuidGenerator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert!(!config.strict);
        assert!(config.emit_prefixes);
        assert_eq!(config.type_namespace, "http://example.org/types/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"strict": true, "entity_namespace": "urn:x/"}}"#).unwrap();

        let config = ConverterConfig::from_file(file.path()).unwrap();
        assert!(config.strict);
        assert_eq!(config.entity_namespace, "urn:x/");
        assert_eq!(config.predicate_namespace, DEFAULT_PREDICATE_NAMESPACE);
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let config = ConverterConfig {
            type_namespace: "http://example.org/types".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_generators() {
        let seq = SequentialGenerator::new();
        assert_eq!(seq.next_id(), "1");
        assert_eq!(seq.next_id(), "2");

        let seq = SequentialGenerator::starting_at(10);
        assert_eq!(seq.next_id(), "10");

        let a = UuidGenerator.next_id();
        let b = UuidGenerator.next_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
