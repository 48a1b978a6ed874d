//! 过滤/流水线选项与统计信息（模块）
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::filter::RejectReason;

/// 中心区域过滤选项
/// - 归一化中心坐标 (x/width, y/height) 两个分量都须落在 [region_min, region_max]（闭区间）
/// - 默认 [0.25, 0.75]，即画面中央 50%×50% 的取景框
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterOptions {
    pub region_min: f32,
    pub region_max: f32,
    /// 是否接受空字符串文本（默认接受，保持原策略）
    pub allow_empty_text: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self { region_min: 0.25, region_max: 0.75, allow_empty_text: true }
    }
}

impl FilterOptions {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.region_min) || !in_unit(self.region_max) {
            return Err(Error::InvalidConfig(format!(
                "filter region must lie within [0, 1], got [{}, {}]",
                self.region_min, self.region_max
            )));
        }
        if self.region_min > self.region_max {
            return Err(Error::InvalidConfig(format!(
                "filter region_min ({}) exceeds region_max ({})",
                self.region_min, self.region_max
            )));
        }
        Ok(())
    }
}

/// 检测流水线选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    /// 有界队列容量；相机侧只保留最新帧，默认 1
    pub queue_capacity: usize,
    /// 队列满时丢弃新事件（相机行为）；为 false 时 submit 阻塞（回放行为）
    pub drop_when_busy: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { queue_capacity: 1, drop_when_busy: false }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("pipeline queue_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// 扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// 提交给流水线的事件数
    pub events_submitted: usize,
    /// 因队列已满被丢弃的事件数
    pub events_dropped: usize,
    /// 通过过滤器的事件数（不论状态机是否处于待扫描）
    pub events_accepted: usize,
    /// 被过滤器拒绝的事件数，按原因分组
    pub events_rejected: BTreeMap<RejectReason, usize>,
    /// 结果面板显示期间到达、被状态机忽略的事件数（与接受/拒绝计数正交）
    pub events_ignored: usize,
    /// 实际捕获的结果数
    pub results_captured: usize,
}

impl ScanStats {
    pub fn rejected_total(&self) -> usize {
        self.events_rejected.values().sum()
    }

    pub(crate) fn record_rejection(&mut self, reason: RejectReason) {
        *self.events_rejected.entry(reason).or_default() += 1;
    }

    /// 合并另一份统计（并行审计时按分片汇总）
    pub(crate) fn merge(mut self, other: ScanStats) -> Self {
        self.events_submitted += other.events_submitted;
        self.events_dropped += other.events_dropped;
        self.events_accepted += other.events_accepted;
        self.events_ignored += other.events_ignored;
        self.results_captured += other.results_captured;
        for (reason, n) in other.events_rejected {
            *self.events_rejected.entry(reason).or_default() += n;
        }
        self
    }
}
