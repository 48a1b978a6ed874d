//! 扫描状态机（待扫描 ⇄ 结果显示）
//!
//! 状态存放在 `watch` 通道中：每次变更整体替换可观察值，读者总能看到最新值，不会读到半更新状态。
//! “检查 armed + 写入结果”在 `send_if_modified` 的同一把锁内完成，因此即使多个线程同时
//! 回调，每次布防也只会捕获第一个被接受的检测。
use tokio::sync::watch;
use tracing::{debug, info};

use crate::filter::{DetectionFilter, RejectReason, Verdict};
use crate::types::{DetectionEvent, ScanResult, ScanState};

/// 单次检测回调的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// 捕获了新结果，状态机已解除布防
    Captured,
    /// 结果面板仍在显示，检测被忽略
    Ignored,
    /// 过滤器拒绝
    Rejected(RejectReason),
}

#[derive(Debug)]
pub struct ScanStateMachine {
    filter: DetectionFilter,
    state: watch::Sender<ScanState>,
}

impl Default for ScanStateMachine {
    fn default() -> Self {
        Self::new(DetectionFilter::default())
    }
}

impl ScanStateMachine {
    pub fn new(filter: DetectionFilter) -> Self {
        let (state, _) = watch::channel(ScanState::armed());
        Self { filter, state }
    }

    pub fn filter(&self) -> &DetectionFilter {
        &self.filter
    }

    /// 检测回调（唯一的“产生结果”入口）
    pub fn on_detection(&self, event: &DetectionEvent) -> DetectionOutcome {
        // 过滤是纯函数，放在锁外
        let verdict = self.filter.evaluate(event);
        let mut outcome = DetectionOutcome::Ignored;
        let mut captured: Option<ScanResult> = None;

        self.state.send_if_modified(|state| {
            if !state.armed {
                return false;
            }
            match (verdict, event.text.as_deref()) {
                (Verdict::Accepted, Some(text)) => {
                    let result = ScanResult::new(text);
                    captured = Some(result.clone());
                    *state = ScanState::showing(result);
                    outcome = DetectionOutcome::Captured;
                    true
                }
                (Verdict::Rejected(reason), _) => {
                    outcome = DetectionOutcome::Rejected(reason);
                    false
                }
                // 过滤器不会在缺少文本时放行
                (Verdict::Accepted, None) => {
                    outcome = DetectionOutcome::Rejected(RejectReason::MissingText);
                    false
                }
            }
        });

        match outcome {
            DetectionOutcome::Captured => {
                if let Some(result) = captured {
                    info!(text = %result.text, is_url = result.is_url, "scan result captured");
                }
            }
            DetectionOutcome::Ignored => debug!("detection ignored while result is shown"),
            DetectionOutcome::Rejected(reason) => debug!(%reason, "detection rejected"),
        }
        outcome
    }

    /// 关闭结果面板：清空结果并重新布防；已处于待扫描时不发布变更
    pub fn dismiss_result(&self) {
        if self.rearm() {
            info!("result dismissed, scanning re-armed");
        }
    }

    /// 宿主主动恢复扫描：强制回到待扫描，同时清空残留结果以维持不变式
    pub fn reset_scanning(&self) {
        if self.rearm() {
            info!("scanning reset");
        }
    }

    fn rearm(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.armed && state.current_result.is_none() {
                return false;
            }
            *state = ScanState::armed();
            true
        })
    }

    /// 当前状态快照
    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.state.borrow().armed
    }

    pub fn current_result(&self) -> Option<ScanResult> {
        self.state.borrow().current_result.clone()
    }

    /// 只读订阅；每次变更后接收方看到的都是完整的最新状态
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameSize, Point};
    use std::sync::Arc;

    fn centered(text: &str) -> DetectionEvent {
        DetectionEvent::new(text, Point { x: 50.0, y: 50.0 }, FrameSize { width: 100.0, height: 100.0 })
    }

    #[test]
    fn starts_armed_without_result() {
        let m = ScanStateMachine::default();
        assert_eq!(m.state(), ScanState::armed());
        assert!(m.is_scanning());
    }

    #[test]
    fn accepted_detection_shows_result_and_disarms() {
        let m = ScanStateMachine::default();
        assert_eq!(m.on_detection(&centered("www.abc.com")), DetectionOutcome::Captured);

        let s = m.state();
        assert!(!s.armed);
        assert_eq!(s.current_result, Some(ScanResult { text: "www.abc.com".into(), is_url: true }));

        m.dismiss_result();
        assert_eq!(m.state(), ScanState::armed());
    }

    #[test]
    fn only_first_accepted_detection_is_kept() {
        let m = ScanStateMachine::default();
        assert_eq!(m.on_detection(&centered("first")), DetectionOutcome::Captured);
        assert_eq!(m.on_detection(&centered("second")), DetectionOutcome::Ignored);
        assert_eq!(m.current_result().map(|r| r.text), Some("first".to_string()));
    }

    #[test]
    fn rejected_detection_leaves_state_armed() {
        let m = ScanStateMachine::default();
        let edge = DetectionEvent::new("edge", Point { x: 5.0, y: 5.0 }, FrameSize { width: 100.0, height: 100.0 });
        assert_eq!(m.on_detection(&edge), DetectionOutcome::Rejected(RejectReason::OutsideRegion));
        assert_eq!(m.state(), ScanState::armed());
    }

    #[test]
    fn dismiss_is_idempotent_when_armed() {
        let m = ScanStateMachine::default();
        let rx = m.subscribe();
        m.dismiss_result();
        m.dismiss_result();
        assert_eq!(m.state(), ScanState::armed());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn reset_clears_stale_result() {
        let m = ScanStateMachine::default();
        m.on_detection(&centered("1234567890"));
        m.reset_scanning();
        let s = m.state();
        assert!(s.armed);
        assert!(s.current_result.is_none());

        // 重新布防后可以再次捕获
        assert_eq!(m.on_detection(&centered("again")), DetectionOutcome::Captured);
    }

    #[test]
    fn subscribers_see_latest_state() {
        let m = ScanStateMachine::default();
        let mut rx = m.subscribe();
        m.on_detection(&centered("https://example.com"));
        assert!(rx.has_changed().unwrap());
        {
            let seen = rx.borrow_and_update();
            assert!(!seen.armed);
            assert!(seen.current_result.as_ref().is_some_and(|r| r.is_url));
        }
        m.dismiss_result();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ScanState::armed());
    }

    #[test]
    fn concurrent_detections_capture_exactly_one() {
        let m = Arc::new(ScanStateMachine::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    (0..50).filter(|j| m.on_detection(&centered(&format!("t{i}-{j}"))) == DetectionOutcome::Captured).count()
                })
            })
            .collect();
        let captured: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(captured, 1);
        assert!(!m.is_scanning());
        assert!(m.current_result().is_some());
    }
}
