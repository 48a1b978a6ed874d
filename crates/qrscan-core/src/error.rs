//! 错误类型（对外暴露）
//!
//! 过滤器与状态机本身不会失败；只有事件日志读取、配置加载与流水线收尾会返回错误。
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 事件日志中某一行不是合法 JSON（行号从 1 开始）
    #[error("{}:{line}: invalid detection event: {source}", path.display())]
    EventParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("detection worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;
