//! 转换指标收集模块
//!
//! 进程级的转换计数、语句类型分布、宽松回退次数与耗时统计

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 语句类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Delete,
    Combined,
}

/// 全局转换指标
#[derive(Debug)]
pub struct Metrics {
    conversion_stats: ConversionStats,
    statement_stats: StatementStats,
    schema_stats: SchemaStats,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct ConversionStats {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    /// 转换总耗时（微秒）
    total_duration_us: AtomicU64,
    syntax_errors: AtomicU64,
    unsupported_errors: AtomicU64,
    mismatch_errors: AtomicU64,
}

#[derive(Debug, Default)]
struct StatementStats {
    select: AtomicU64,
    insert: AtomicU64,
    delete: AtomicU64,
    combined: AtomicU64,
}

#[derive(Debug, Default)]
struct SchemaStats {
    /// 目录未命中后使用默认命名空间的次数
    fallbacks: AtomicU64,
    catalogs_inferred: AtomicU64,
    triples_loaded: AtomicU64,
}

/// 可导出的指标快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub conversions_total: u64,
    pub conversions_succeeded: u64,
    pub conversions_failed: u64,
    pub avg_conversion_duration_ms: f64,
    pub syntax_errors: u64,
    pub unsupported_errors: u64,
    pub projection_mismatch_errors: u64,

    pub select_statements: u64,
    pub insert_statements: u64,
    pub delete_statements: u64,
    pub combined_statements: u64,

    pub lenient_fallbacks: u64,
    pub catalogs_inferred: u64,
    pub triples_loaded: u64,

    pub uptime_seconds: u64,
}

/// Prometheus 格式指标
#[derive(Debug, Clone)]
pub struct PrometheusMetrics {
    pub content: String,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            conversion_stats: ConversionStats::default(),
            statement_stats: StatementStats::default(),
            schema_stats: SchemaStats::default(),
            start_time: Instant::now(),
        }
    }

    /// 记录转换开始
    pub fn record_conversion_start(&self) -> ConversionTimer {
        self.conversion_stats.total.fetch_add(1, Ordering::Relaxed);
        ConversionTimer::new()
    }

    /// 记录转换完成；失败时 `error_kind` 为错误类别
    pub fn record_conversion_complete(&self, timer: ConversionTimer, error_kind: Option<&str>) {
        let stats = &self.conversion_stats;
        stats
            .total_duration_us
            .fetch_add(timer.elapsed().as_micros() as u64, Ordering::Relaxed);

        match error_kind {
            None => {
                stats.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Some(kind) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                let counter = match kind {
                    "syntax" => Some(&stats.syntax_errors),
                    "unsupported" => Some(&stats.unsupported_errors),
                    "projection_mismatch" => Some(&stats.mismatch_errors),
                    _ => None,
                };
                if let Some(counter) = counter {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn record_statement(&self, kind: StatementKind) {
        let counter = match kind {
            StatementKind::Select => &self.statement_stats.select,
            StatementKind::Insert => &self.statement_stats.insert,
            StatementKind::Delete => &self.statement_stats.delete,
            StatementKind::Combined => &self.statement_stats.combined,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次宽松回退（目录未命中、未知函数名）
    pub fn record_fallback(&self) {
        self.schema_stats.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_catalog_inferred(&self) {
        self.schema_stats.catalogs_inferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_triples_loaded(&self, count: u64) {
        self.schema_stats.triples_loaded.fetch_add(count, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.conversion_stats;
        let total = c.total.load(Ordering::Relaxed);
        let total_duration_us = c.total_duration_us.load(Ordering::Relaxed);

        let avg_conversion_duration_ms = if total > 0 {
            (total_duration_us as f64) / (total as f64) / 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            conversions_total: total,
            conversions_succeeded: c.succeeded.load(Ordering::Relaxed),
            conversions_failed: c.failed.load(Ordering::Relaxed),
            avg_conversion_duration_ms,
            syntax_errors: c.syntax_errors.load(Ordering::Relaxed),
            unsupported_errors: c.unsupported_errors.load(Ordering::Relaxed),
            projection_mismatch_errors: c.mismatch_errors.load(Ordering::Relaxed),
            select_statements: self.statement_stats.select.load(Ordering::Relaxed),
            insert_statements: self.statement_stats.insert.load(Ordering::Relaxed),
            delete_statements: self.statement_stats.delete.load(Ordering::Relaxed),
            combined_statements: self.statement_stats.combined.load(Ordering::Relaxed),
            lenient_fallbacks: self.schema_stats.fallbacks.load(Ordering::Relaxed),
            catalogs_inferred: self.schema_stats.catalogs_inferred.load(Ordering::Relaxed),
            triples_loaded: self.schema_stats.triples_loaded.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// 导出为 Prometheus 格式
    pub fn to_prometheus(&self) -> PrometheusMetrics {
        let s = self.snapshot();
        let mut content = String::new();

        let mut metric = |name: &str, kind: &str, help: &str, value: String| {
            content.push_str(&format!("# HELP relgraph_{} {}\n", name, help));
            content.push_str(&format!("# TYPE relgraph_{} {}\n", name, kind));
            content.push_str(&format!("relgraph_{} {}\n", name, value));
        };

        // 转换指标
        metric("conversions_total", "counter", "Total number of conversions", s.conversions_total.to_string());
        metric("conversions_succeeded_total", "counter", "Number of successful conversions", s.conversions_succeeded.to_string());
        metric("conversions_failed_total", "counter", "Number of failed conversions", s.conversions_failed.to_string());
        metric(
            "conversion_duration_avg_ms",
            "gauge",
            "Average conversion duration in milliseconds",
            format!("{:.3}", s.avg_conversion_duration_ms),
        );
        metric("syntax_errors_total", "counter", "Conversions rejected with a syntax error", s.syntax_errors.to_string());
        metric("unsupported_errors_total", "counter", "Conversions rejected for an unsupported construct", s.unsupported_errors.to_string());
        metric(
            "projection_mismatch_errors_total",
            "counter",
            "Combined queries whose branches project different widths",
            s.projection_mismatch_errors.to_string(),
        );

        // 语句类型
        metric("select_statements_total", "counter", "SELECT statements converted", s.select_statements.to_string());
        metric("insert_statements_total", "counter", "INSERT statements converted", s.insert_statements.to_string());
        metric("delete_statements_total", "counter", "DELETE statements converted", s.delete_statements.to_string());
        metric("combined_statements_total", "counter", "UNION/INTERSECT/EXCEPT statements converted", s.combined_statements.to_string());

        // 目录
        metric("lenient_fallbacks_total", "counter", "Catalog misses resolved with default namespaces", s.lenient_fallbacks.to_string());
        metric("catalogs_inferred_total", "counter", "Schema catalogs inferred from triples", s.catalogs_inferred.to_string());
        metric("triples_loaded_total", "counter", "RDF triples loaded for inference", s.triples_loaded.to_string());

        metric("uptime_seconds", "counter", "Process uptime in seconds", s.uptime_seconds.to_string());

        PrometheusMetrics { content }
    }

    /// 重置所有指标
    pub fn reset(&self) {
        let c = &self.conversion_stats;
        for counter in [
            &c.total,
            &c.succeeded,
            &c.failed,
            &c.total_duration_us,
            &c.syntax_errors,
            &c.unsupported_errors,
            &c.mismatch_errors,
            &self.statement_stats.select,
            &self.statement_stats.insert,
            &self.statement_stats.delete,
            &self.statement_stats.combined,
            &self.schema_stats.fallbacks,
            &self.schema_stats.catalogs_inferred,
            &self.schema_stats.triples_loaded,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 转换计时器
pub struct ConversionTimer {
    start: Instant,
}

impl ConversionTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// 全局指标实例
static METRICS: once_cell::sync::Lazy<Arc<Metrics>> =
    once_cell::sync::Lazy::new(|| Arc::new(Metrics::new()));

/// 获取全局指标实例
pub fn global_metrics() -> Arc<Metrics> {
    METRICS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::new();

        let timer = metrics.record_conversion_start();
        std::thread::sleep(Duration::from_millis(5));
        metrics.record_conversion_complete(timer, None);

        let timer = metrics.record_conversion_start();
        metrics.record_conversion_complete(timer, Some("syntax"));

        metrics.record_statement(StatementKind::Select);
        metrics.record_fallback();
        metrics.record_fallback();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.conversions_total, 2);
        assert_eq!(snapshot.conversions_succeeded, 1);
        assert_eq!(snapshot.conversions_failed, 1);
        assert_eq!(snapshot.syntax_errors, 1);
        assert_eq!(snapshot.select_statements, 1);
        assert_eq!(snapshot.lenient_fallbacks, 2);
        assert!(snapshot.avg_conversion_duration_ms >= 2.5);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_conversion_start();
        metrics.record_fallback();

        let prom = metrics.to_prometheus();
        assert!(prom.content.contains("relgraph_conversions_total 1"));
        assert!(prom.content.contains("# TYPE relgraph_lenient_fallbacks_total counter"));
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_statement(StatementKind::Delete);
        metrics.record_triples_loaded(42);
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.delete_statements, 0);
        assert_eq!(snapshot.triples_loaded, 0);
    }
}
