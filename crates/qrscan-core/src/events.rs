//! 检测事件日志读取（JSON Lines）
//!
//! 每行一个被识别的符号：
//! `{"text": "...", "center": {"x": 50, "y": 50}, "frame": {"width": 100, "height": 100}}`
//! 也可以用 `bounding_box` 代替 `center`。空行与 `#` 开头的行被跳过。
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{BoundingBox, DetectionEvent, FrameSize, Point};

/// 日志中的单条记录
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionRecord {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub center: Option<Point>,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    pub frame: FrameSize,
}

impl DetectionRecord {
    /// 转为检测事件；识别器既没给中心也没给外接矩形时为非事件（None）
    pub fn into_event(self) -> Option<DetectionEvent> {
        match (self.center, self.bounding_box) {
            (Some(center), _) => Some(DetectionEvent { text: self.text, bounding_box_center: center, frame_size: self.frame }),
            (None, Some(bbox)) => Some(DetectionEvent::from_bounding_box(self.text, bbox, self.frame)),
            (None, None) => None,
        }
    }
}

/// 读取结果
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub events: Vec<DetectionEvent>,
    /// 缺少位置信息而被跳过的记录数
    pub skipped: usize,
    pub files: Vec<PathBuf>,
}

impl EventLog {
    fn extend(&mut self, other: EventLog) {
        self.events.extend(other.events);
        self.skipped += other.skipped;
        self.files.extend(other.files);
    }
}

/// 收集输入：文件直接返回；目录仅取第一层的 *.jsonl，并按文件名排序保证顺序可复现
pub fn collect_event_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input not found: {}", input.display()),
        )));
    }

    let mut files: Vec<PathBuf> = vec![];
    for entry in WalkDir::new(input).min_depth(1).max_depth(1) {
        let entry = match entry { Ok(e) => e, Err(_) => continue };
        let is_jsonl = entry.path().extension().is_some_and(|ext| ext == "jsonl");
        if entry.file_type().is_file() && is_jsonl { files.push(entry.into_path()); }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// 读取单个文件或整个目录的事件，按文件顺序拼接
pub fn load_events(input: &Path) -> Result<EventLog> {
    let mut log = EventLog::default();
    for path in collect_event_files(input)? {
        log.extend(read_event_file(&path)?);
    }
    Ok(log)
}

pub fn read_event_file(path: &Path) -> Result<EventLog> {
    let reader = BufReader::new(File::open(path)?);
    let mut log = parse_events(reader, path)?;
    log.files.push(path.to_path_buf());
    Ok(log)
}

/// 逐行解析；`path` 仅用于错误信息
pub fn parse_events<R: BufRead>(reader: R, path: &Path) -> Result<EventLog> {
    let mut log = EventLog::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') { continue; }

        let record: DetectionRecord = serde_json::from_str(trimmed).map_err(|source| Error::EventParse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        match record.into_event() {
            Some(event) => log.events.push(event),
            None => log.skipped += 1,
        }
    }
    Ok(log)
}
