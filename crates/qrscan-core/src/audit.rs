//! 过滤器审计：对录制的事件日志并行运行中心区域过滤器，统计接受/拒绝分布
//!
//! 过滤器是纯函数，可以安全地在 Rayon 线程池中并行；不经过状态机，因此不存在“忽略”计数。
use rayon::prelude::*;

use crate::error::Result;
use crate::filter::{DetectionFilter, Verdict};
use crate::options::ScanStats;
use crate::types::DetectionEvent;

/// `threads` 为 None 时等于 CPU 核数；Some(1) 走串行
pub fn audit_events(events: &[DetectionEvent], filter: &DetectionFilter, threads: Option<usize>) -> Result<ScanStats> {
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    if threads == 1 {
        return Ok(events.iter().fold(ScanStats::default(), |acc, e| tally(acc, filter, e)));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()?;
    let stats = pool.install(|| {
        events
            .par_iter()
            .fold(ScanStats::default, |acc, e| tally(acc, filter, e))
            .reduce(ScanStats::default, ScanStats::merge)
    });
    Ok(stats)
}

fn tally(mut acc: ScanStats, filter: &DetectionFilter, event: &DetectionEvent) -> ScanStats {
    acc.events_submitted += 1;
    match filter.evaluate(event) {
        Verdict::Accepted => acc.events_accepted += 1,
        Verdict::Rejected(reason) => acc.record_rejection(reason),
    }
    acc
}
