//! 错误类型定义

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("语法错误: {message} (位置: '{fragment}')")]
    Syntax { message: String, fragment: String },

    #[error("不支持的语法结构: {0}")]
    UnsupportedConstruct(String),

    #[error("{combinator} 分支投影列数不一致: 左侧 {left}, 右侧 {right}")]
    ProjectionMismatch {
        combinator: String,
        left: usize,
        right: usize,
    },

    #[error("导入错误: {0}")]
    Import(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("服务器错误: {0}")]
    Server(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a syntax error that carries the offending query fragment.
    pub fn syntax(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Error::Syntax {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Error::UnsupportedConstruct(what.into())
    }

    /// Short machine-readable category, used by the HTTP API and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Syntax { .. } => "syntax",
            Error::UnsupportedConstruct(_) => "unsupported",
            Error::ProjectionMismatch { .. } => "projection_mismatch",
            Error::Import(_) => "import",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Server(_) => "server",
            Error::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
