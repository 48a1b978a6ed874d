//! 公共类型（对外暴露）
use serde::{Deserialize, Serialize};

/// 像素坐标点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// 被分析帧的尺寸（像素）。合法帧的宽高均 > 0，但外部协作方可能给出非法值。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: f32,
    pub height: f32,
}

impl FrameSize {
    /// 宽高均为正的有限数（NaN 也视为非法）
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

/// 识别器给出的码区域外接矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    /// 中心点向下取整到整像素，与识别器 `(left + right) >> 1` 的整数中心一致
    pub fn center(&self) -> Point {
        Point {
            x: ((self.left + self.right) / 2.0).floor(),
            y: ((self.top + self.bottom) / 2.0).floor(),
        }
    }
}

/// 单帧中单个被识别符号的检测事件（一次性，交给过滤器后即丢弃）
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    /// 解码文本；`None` 表示识别器没有给出内容（非事件）
    pub text: Option<String>,
    pub bounding_box_center: Point,
    pub frame_size: FrameSize,
}

impl DetectionEvent {
    pub fn new(text: impl Into<String>, center: Point, frame_size: FrameSize) -> Self {
        Self { text: Some(text.into()), bounding_box_center: center, frame_size }
    }

    /// 由外接矩形构造事件，中心点取矩形中心
    pub fn from_bounding_box(text: Option<String>, bbox: BoundingBox, frame_size: FrameSize) -> Self {
        Self { text, bounding_box_center: bbox.center(), frame_size }
    }
}

/// 被接受的扫描结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub text: String,
    pub is_url: bool,
}

impl ScanResult {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let is_url = looks_like_url(&text);
        Self { text, is_url }
    }

    /// 结果面板上可用的操作：URL 才有“打开”，复制与关闭始终可用
    pub fn actions(&self) -> Vec<ResultAction> {
        let mut out = Vec::with_capacity(3);
        if self.is_url {
            out.push(ResultAction::Open);
        }
        out.push(ResultAction::Copy);
        out.push(ResultAction::Close);
        out
    }

    /// 交给 URL 打开器的目标；非 URL 时为 None
    pub fn open_target(&self) -> Option<&str> {
        self.is_url.then_some(self.text.as_str())
    }
}

/// 前缀判断（区分大小写）：http:// 、https:// 或 www.
pub(crate) fn looks_like_url(text: &str) -> bool {
    ["http://", "https://", "www."].iter().any(|p| text.starts_with(p))
}

/// 结果面板操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultAction {
    Open,
    Copy,
    Close,
}

/// 可观察的扫描状态
///
/// 不变式：`current_result.is_some()` 蕴含 `!armed`。两个字段只经由状态机整体替换。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    pub armed: bool,
    pub current_result: Option<ScanResult>,
}

impl ScanState {
    pub fn armed() -> Self {
        Self { armed: true, current_result: None }
    }

    pub(crate) fn showing(result: ScanResult) -> Self {
        Self { armed: false, current_result: Some(result) }
    }

    pub fn is_showing_result(&self) -> bool {
        self.current_result.is_some()
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::armed()
    }
}
