//! 中心区域检测过滤器
//!
//! 相机视野很宽，而取景框只覆盖画面中央；只接受外接矩形中心落在中央区域内的检测，
//! 避免误扫画面边缘的码。纯函数，无副作用。
use serde::Serialize;
use std::fmt;

use crate::options::FilterOptions;
use crate::types::DetectionEvent;

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// 识别器没有给出文本
    MissingText,
    /// 文本为空且配置不接受空文本
    EmptyText,
    /// 帧宽或帧高非正（不做除法）
    InvalidFrame,
    /// 归一化中心落在取景区域之外
    OutsideRegion,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::MissingText => "missing_text",
            RejectReason::EmptyText => "empty_text",
            RejectReason::InvalidFrame => "invalid_frame",
            RejectReason::OutsideRegion => "outside_region",
        };
        f.write_str(s)
    }
}

/// 过滤结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionFilter {
    opts: FilterOptions,
}

impl DetectionFilter {
    pub fn new(opts: FilterOptions) -> Self {
        Self { opts }
    }

    pub fn accept(&self, event: &DetectionEvent) -> bool {
        self.evaluate(event).is_accepted()
    }

    /// 判定顺序：帧尺寸 → 中心区域 → 文本
    pub fn evaluate(&self, event: &DetectionEvent) -> Verdict {
        let frame = event.frame_size;
        if !frame.is_valid() {
            return Verdict::Rejected(RejectReason::InvalidFrame);
        }

        let nx = event.bounding_box_center.x / frame.width;
        let ny = event.bounding_box_center.y / frame.height;
        // NaN 不落在任何区间内，自然被拒
        let region = self.opts.region_min..=self.opts.region_max;
        if !region.contains(&nx) || !region.contains(&ny) {
            return Verdict::Rejected(RejectReason::OutsideRegion);
        }

        match event.text.as_deref() {
            None => Verdict::Rejected(RejectReason::MissingText),
            Some("") if !self.opts.allow_empty_text => Verdict::Rejected(RejectReason::EmptyText),
            Some(_) => Verdict::Accepted,
        }
    }
}
