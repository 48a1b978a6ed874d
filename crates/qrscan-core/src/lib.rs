//! 扫码核心库
//!
//! 设计要点：
//! - 相机与识别引擎是外部协作方，核心只消费它们产出的检测事件（`DetectionEvent`）。
//! - 中心区域过滤器（`DetectionFilter`）为纯函数：只接受外接矩形中心落在画面中央 [0.25, 0.75] 区域的检测。
//! - 扫描状态机（`ScanStateMachine`）在“待扫描 / 结果显示”之间切换；每次布防只捕获第一个被接受的检测。
//! - 单个后台 worker 经由有界通道驱动状态机（`DetectionPipeline`），界面侧通过 `watch` 订阅只读状态。

mod audit;
mod config;
mod error;
mod events;
mod filter;
mod machine;
mod options;
mod pipeline;
mod types;

pub use audit::audit_events;
pub use config::{load_config, ScannerConfig};
pub use error::{Error, Result};
pub use events::{collect_event_files, load_events, parse_events, read_event_file, DetectionRecord, EventLog};
pub use filter::{DetectionFilter, RejectReason, Verdict};
pub use machine::{DetectionOutcome, ScanStateMachine};
pub use options::{FilterOptions, PipelineOptions, ScanStats};
pub use pipeline::{DetectionPipeline, SheetAck};
pub use types::{BoundingBox, DetectionEvent, FrameSize, Point, ResultAction, ScanResult, ScanState};

/// 重新导出 `watch::Receiver`，订阅方无需直接依赖 tokio
pub use tokio::sync::watch::Receiver as StateReceiver;
