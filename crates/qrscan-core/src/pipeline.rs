//! 检测流水线：单生产者 → 有界通道 → 单个后台 worker → 状态机
//!
//! - 生产者（相机/回放）持有 `DetectionPipeline`，通过 `submit` 投递事件；`&mut self` 保证只有一个生产者
//! - worker 线程按到达顺序逐个调用 `on_detection`，并累计统计信息
//! - 相机模式下队列满即丢帧（只保留最新帧），回放模式下阻塞等待
//! - 门控模式（`start_gated`）下 worker 每捕获一个结果就阻塞，直到界面侧通过 `SheetAck` 确认面板已处理，
//!   使同一份回放日志得到确定的结果
use crossbeam_channel as channel;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::filter::Verdict;
use crate::machine::{DetectionOutcome, ScanStateMachine};
use crate::options::{PipelineOptions, ScanStats};
use crate::types::DetectionEvent;

/// 界面侧的面板确认句柄；处理完（通常是关闭）一个结果面板后调用 `ack`
#[derive(Debug, Clone)]
pub struct SheetAck {
    tx: channel::Sender<()>,
}

impl SheetAck {
    /// worker 已退出时静默忽略
    pub fn ack(&self) {
        let _ = self.tx.send(());
    }
}

pub struct DetectionPipeline {
    tx: Option<channel::Sender<DetectionEvent>>,
    worker: Option<JoinHandle<ScanStats>>,
    drop_when_busy: bool,
    submitted: usize,
    dropped: usize,
}

impl DetectionPipeline {
    /// 启动 worker 线程
    pub fn start(machine: Arc<ScanStateMachine>, opts: PipelineOptions) -> Result<Self> {
        Self::spawn(machine, opts, None)
    }

    /// 启动门控 worker：每次捕获结果后等待一次 `SheetAck::ack`
    pub fn start_gated(machine: Arc<ScanStateMachine>, opts: PipelineOptions) -> Result<(Self, SheetAck)> {
        let (ack_tx, ack_rx) = channel::unbounded::<()>();
        let pipeline = Self::spawn(machine, opts, Some(ack_rx))?;
        Ok((pipeline, SheetAck { tx: ack_tx }))
    }

    fn spawn(machine: Arc<ScanStateMachine>, opts: PipelineOptions, ack: Option<channel::Receiver<()>>) -> Result<Self> {
        opts.validate()?;
        let (tx, rx) = channel::bounded::<DetectionEvent>(opts.queue_capacity);

        let worker = std::thread::Builder::new()
            .name("qrscan-detect".into())
            .spawn(move || run_worker(&machine, rx, ack))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            drop_when_busy: opts.drop_when_busy,
            submitted: 0,
            dropped: 0,
        })
    }

    /// 投递一个检测事件；返回是否入队（丢帧或 worker 已退出时为 false）
    pub fn submit(&mut self, event: DetectionEvent) -> bool {
        let tx = match self.tx.as_ref() {
            Some(tx) => tx,
            None => return false,
        };
        self.submitted += 1;

        let sent = if self.drop_when_busy {
            match tx.try_send(event) {
                Ok(()) => true,
                Err(channel::TrySendError::Full(_)) => {
                    debug!("detection queue full, frame dropped");
                    false
                }
                Err(channel::TrySendError::Disconnected(_)) => {
                    warn!("detection worker is gone, event discarded");
                    false
                }
            }
        } else {
            match tx.send(event) {
                Ok(()) => true,
                Err(_) => {
                    warn!("detection worker is gone, event discarded");
                    false
                }
            }
        };

        if !sent {
            self.dropped += 1;
        }
        sent
    }

    /// 关闭通道并等待 worker 处理完剩余事件
    pub fn finish(mut self) -> Result<ScanStats> {
        let mut stats = self.shutdown()?;
        stats.events_submitted = self.submitted;
        stats.events_dropped = self.dropped;
        Ok(stats)
    }

    fn shutdown(&mut self) -> Result<ScanStats> {
        // 丢弃 Sender 后 worker 的 recv 返回 Err，循环自然结束
        self.tx.take();
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanicked),
            None => Ok(ScanStats::default()),
        }
    }
}

impl Drop for DetectionPipeline {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn run_worker(
    machine: &ScanStateMachine,
    rx: channel::Receiver<DetectionEvent>,
    mut ack: Option<channel::Receiver<()>>,
) -> ScanStats {
    let mut stats = ScanStats::default();
    while let Ok(event) = rx.recv() {
        match machine.on_detection(&event) {
            DetectionOutcome::Captured => {
                stats.events_accepted += 1;
                stats.results_captured += 1;
                if let Some(gate) = ack.as_ref() {
                    if gate.recv().is_err() {
                        // 所有 SheetAck 都已丢弃：不再等待
                        warn!("sheet acknowledger is gone, continuing without gating");
                        ack = None;
                    }
                }
            }
            DetectionOutcome::Rejected(reason) => stats.record_rejection(reason),
            DetectionOutcome::Ignored => {
                stats.events_ignored += 1;
                match machine.filter().evaluate(&event) {
                    Verdict::Accepted => stats.events_accepted += 1,
                    Verdict::Rejected(reason) => stats.record_rejection(reason),
                }
            }
        }
    }
    stats
}
