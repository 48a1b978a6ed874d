use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use qrscan_core::{
    audit_events, load_config, load_events, DetectionEvent, DetectionFilter, DetectionPipeline, ResultAction, ScanResult,
    ScanState, ScanStateMachine, ScanStats, ScannerConfig, SheetAck, StateReceiver,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{info, warn};

/// 默认配置文件路径（存在时自动加载）
const DEFAULT_CONFIG: &str = "./qrscan.toml";

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "qrscan", version, about = "Center-region QR scan session over recorded detection events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 回放检测事件：经由后台 worker 驱动状态机，并渲染每个结果面板
    Replay {
        /// 事件日志（单个 .jsonl 文件或包含 .jsonl 的目录）
        #[arg(long)]
        input: PathBuf,

        /// 结果输出文件（JSON 数组）；缺省时只打印
        #[arg(long)]
        output: Option<PathBuf>,

        /// 配置文件（TOML），默认 ./qrscan.toml（不存在则用内置默认值）
        #[arg(long)]
        config: Option<PathBuf>,

        /// 每显示一个结果即自动关闭面板并重新布防
        #[arg(long)]
        auto_dismiss: bool,

        /// 队列满时丢帧（模拟相机），否则阻塞回放
        #[arg(long)]
        drop_when_busy: bool,
    },
    /// 只运行中心区域过滤器，统计接受/拒绝分布
    Audit {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// 线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { input, output, config, auto_dismiss, drop_when_busy } => {
            let mut cfg = resolve_config(config.as_deref())?;
            if drop_when_busy {
                cfg.pipeline.drop_when_busy = true;
            }
            replay(&input, output, cfg, auto_dismiss)?;
        }
        Commands::Audit { input, config, threads } => {
            let cfg = resolve_config(config.as_deref())?;
            let log = load_events(&input).with_context(|| format!("read events from {}", input.display()))?;
            info!(events = log.events.len(), skipped = log.skipped, "starting audit");

            let filter = DetectionFilter::new(cfg.filter);
            let stats = audit_events(&log.events, &filter, parse_threads(&threads)).context("audit failed")?;
            info!(accepted = stats.events_accepted, rejected = stats.rejected_total(), "audit finished");
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn replay(input: &Path, output: Option<PathBuf>, cfg: ScannerConfig, auto_dismiss: bool) -> Result<()> {
    let log = load_events(input).with_context(|| format!("read events from {}", input.display()))?;
    info!(?input, events = log.events.len(), skipped = log.skipped, files = log.files.len(), "starting replay");

    let out: Option<Box<dyn Write + Send>> = match output {
        Some(p) => Some(Box::new(BufWriter::new(File::create(&p).context("create output file")?))),
        None => None,
    };
    let summary = run_replay(log.events, cfg, auto_dismiss, ResultSink::new(out)?)?;

    let stats = &summary.stats;
    info!(
        submitted = stats.events_submitted,
        dropped = stats.events_dropped,
        accepted = stats.events_accepted,
        rejected = stats.rejected_total(),
        ignored = stats.events_ignored,
        captured = stats.results_captured,
        shown = summary.shown,
        armed = summary.final_state.armed,
        "replay finished"
    );
    Ok(())
}

/// 一次回放的汇总
#[derive(Debug)]
struct ReplaySummary {
    stats: ScanStats,
    shown: usize,
    final_state: ScanState,
}

/// 回放主流程：worker 驱动状态机，观察线程渲染面板并写出结果
/// - 自动关闭模式下使用门控流水线：worker 每捕获一个结果就等观察线程关闭面板后再继续，结果与时序无关
/// - 否则第一个结果一直保留，之后的检测全部被忽略
fn run_replay(events: Vec<DetectionEvent>, cfg: ScannerConfig, auto_dismiss: bool, sink: ResultSink) -> Result<ReplaySummary> {
    let machine = Arc::new(ScanStateMachine::new(DetectionFilter::new(cfg.filter)));
    // 先订阅再启动流水线，保证不漏掉第一个结果
    let rx = machine.subscribe();

    let (mut pipeline, ack) = if auto_dismiss {
        let (pipeline, ack) = DetectionPipeline::start_gated(Arc::clone(&machine), cfg.pipeline).context("start pipeline")?;
        (pipeline, Some(ack))
    } else {
        (DetectionPipeline::start(Arc::clone(&machine), cfg.pipeline).context("start pipeline")?, None)
    };
    let observer = spawn_observer(rx, Arc::downgrade(&machine), ack, sink)?;

    for event in events {
        pipeline.submit(event);
    }
    let stats = pipeline.finish().context("detection pipeline failed")?;

    let final_state = machine.state();
    // 释放最后一个强引用后 watch 发送端关闭，观察线程随之退出
    drop(machine);
    let shown = observer.join().map_err(|_| anyhow!("observer thread panicked"))??;

    Ok(ReplaySummary { stats, shown, final_state })
}

/// 界面侧观察者：订阅状态，出现结果即渲染面板；持有 `SheetAck` 时关闭面板并确认
fn spawn_observer(
    mut rx: StateReceiver<ScanState>,
    machine: Weak<ScanStateMachine>,
    ack: Option<SheetAck>,
    mut sink: ResultSink,
) -> Result<JoinHandle<Result<usize>>> {
    std::thread::Builder::new()
        .name("qrscan-observer".into())
        .spawn(move || -> Result<usize> {
            let rt = tokio::runtime::Builder::new_current_thread().build().context("build observer runtime")?;
            rt.block_on(async move {
                let mut shown = 0usize;
                while rx.changed().await.is_ok() {
                    let result = rx.borrow_and_update().current_result.clone();
                    let Some(result) = result else { continue };

                    render_sheet(&result);
                    sink.write(&result)?;
                    shown += 1;

                    if let Some(ack) = ack.as_ref() {
                        match machine.upgrade() {
                            Some(m) => m.dismiss_result(),
                            None => warn!("scan session already closed, result left open"),
                        }
                        ack.ack();
                    }
                }
                sink.finish()?;
                Ok::<usize, anyhow::Error>(shown)
            })
        })
        .context("spawn observer thread")
}

fn render_sheet(result: &ScanResult) {
    let buttons: Vec<&str> = result
        .actions()
        .iter()
        .map(|a| match a {
            ResultAction::Open => "[Open URL]",
            ResultAction::Copy => "[Copy]",
            ResultAction::Close => "[Close]",
        })
        .collect();
    info!(text = %result.text, is_url = result.is_url, open = ?result.open_target(), "showing scan result");
    println!("Scan Result\n  {}\n  {}", result.text, buttons.join(" "));
    if let Some(target) = result.open_target() {
        println!("  open -> {target}");
    }
}

/// 输出项结构（对应输出文件 JSON 数组的单个元素）
#[derive(Debug, Serialize)]
struct OutputItem<'a> {
    text: &'a str,
    is_url: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    open: Option<&'a str>,
    actions: Vec<ResultAction>,
}

/// 以 JSON 数组流式写入结果；没有输出目标时只渲染不写出
struct ResultSink {
    out: Option<Box<dyn Write + Send>>,
    first: bool,
}

impl ResultSink {
    fn new(mut out: Option<Box<dyn Write + Send>>) -> Result<Self> {
        if let Some(out) = out.as_mut() {
            write!(out, "[")?;
        }
        Ok(Self { out, first: true })
    }

    fn write(&mut self, result: &ScanResult) -> Result<()> {
        let Some(out) = self.out.as_mut() else { return Ok(()) };
        if !self.first { write!(out, ",")?; } else { self.first = false; }
        let item = OutputItem {
            text: &result.text,
            is_url: result.is_url,
            open: result.open_target(),
            actions: result.actions(),
        };
        serde_json::to_writer(&mut *out, &item)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(out) = self.out.as_mut() {
            write!(out, "]")?;
            out.flush()?;
        }
        Ok(())
    }
}

/// 显式指定的配置必须存在；未指定时仅在默认路径存在时加载
fn resolve_config(path: Option<&Path>) -> Result<ScannerConfig> {
    match path {
        Some(p) => load_config(p).with_context(|| format!("load config {}", p.display())),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            load_config(Path::new(DEFAULT_CONFIG)).context("load ./qrscan.toml")
        }
        None => Ok(ScannerConfig::default()),
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=debug
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
