//! HTTP 服务器模块
//!
//! 提供 SQL → SPARQL 转换的 REST 接口

use crate::convert::Converter;
use crate::error::{Error, Result};
use crate::metrics;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<Converter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 指标和统计
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        // 转换与目录
        .route("/convert", post(convert_handler))
        .route("/schema", get(schema_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动服务器
pub async fn start_server(config: ServerConfig, converter: Converter) -> Result<()> {
    let state = AppState {
        converter: Arc::new(converter),
    };
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("relgraph 服务器启动于 http://{}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Server(format!("绑定地址失败: {}", e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Server(format!("服务器错误: {}", e)))?;

    Ok(())
}

// ==================== 处理器 ====================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus 格式指标
async fn metrics_handler() -> Response {
    let prom = metrics::global_metrics().to_prometheus();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        prom.content,
    )
        .into_response()
}

/// 详细统计信息
async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = metrics::global_metrics().snapshot();
    let config = state.converter.config();

    Json(serde_json::json!({
        "conversion": {
            "total": snapshot.conversions_total,
            "succeeded": snapshot.conversions_succeeded,
            "failed": snapshot.conversions_failed,
            "avg_duration_ms": snapshot.avg_conversion_duration_ms,
            "syntax_errors": snapshot.syntax_errors,
            "unsupported_errors": snapshot.unsupported_errors,
            "projection_mismatch_errors": snapshot.projection_mismatch_errors,
        },
        "statements": {
            "select": snapshot.select_statements,
            "insert": snapshot.insert_statements,
            "delete": snapshot.delete_statements,
            "combined": snapshot.combined_statements,
        },
        "schema": {
            "tables": state.converter.catalog().table_names().len(),
            "lenient_fallbacks": snapshot.lenient_fallbacks,
            "catalogs_inferred": snapshot.catalogs_inferred,
            "triples_loaded": snapshot.triples_loaded,
            "strict": config.strict,
        },
        "system": {
            "uptime_seconds": snapshot.uptime_seconds,
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

/// 转换请求
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub sql: String,
}

/// 转换结果
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub sparql: String,
}

async fn convert_handler(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> Response {
    debug!(sql = %req.sql, "convert request");
    match state.converter.convert(&req.sql) {
        Ok(sparql) => (StatusCode::OK, Json(ConvertResponse { sparql })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::failure(&e)),
        )
            .into_response(),
    }
}

/// 目录中的一张虚拟表
#[derive(Debug, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_iri: Option<String>,
    pub columns: Vec<String>,
}

async fn schema_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.converter.catalog();
    let tables: Vec<TableInfo> = catalog
        .table_names()
        .into_iter()
        .map(|name| TableInfo {
            type_iri: catalog.lookup_type(&name).map(|iri| iri.as_str().to_string()),
            columns: catalog.columns(&name).unwrap_or_default(),
            name,
        })
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(tables)))
}

/// API 响应
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 错误类别 (syntax / unsupported / projection_mismatch ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
