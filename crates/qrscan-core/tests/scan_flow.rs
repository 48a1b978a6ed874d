use std::sync::Arc;

use qrscan_core::{
    load_events, DetectionEvent, DetectionFilter, DetectionPipeline, FilterOptions, FrameSize, PipelineOptions, Point,
    RejectReason, ScanResult, ScanState, ScanStateMachine, ScannerConfig,
};

fn frame() -> FrameSize {
    FrameSize { width: 100.0, height: 100.0 }
}

#[test]
fn accepted_url_is_shown_then_dismissed() {
    let machine = ScanStateMachine::default();
    let event = DetectionEvent::new("www.abc.com", Point { x: 50.0, y: 50.0 }, frame());

    assert!(machine.filter().accept(&event));
    machine.on_detection(&event);
    assert_eq!(
        machine.state(),
        ScanState { armed: false, current_result: Some(ScanResult { text: "www.abc.com".into(), is_url: true }) }
    );

    machine.dismiss_result();
    assert_eq!(machine.state(), ScanState { armed: true, current_result: None });
}

#[test]
fn replayed_log_captures_one_result_per_arming() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("session.jsonl");
    std::fs::write(
        &log,
        concat!(
            "# edge of frame, user did not aim at it\n",
            "{\"text\": \"https://edge.example\", \"center\": {\"x\": 10, \"y\": 90}, \"frame\": {\"width\": 100, \"height\": 100}}\n",
            "{\"text\": \"1234567890\", \"bounding_box\": {\"left\": 40, \"top\": 40, \"right\": 60, \"bottom\": 60}, \"frame\": {\"width\": 100, \"height\": 100}}\n",
            "{\"text\": \"https://later.example\", \"center\": {\"x\": 50, \"y\": 50}, \"frame\": {\"width\": 100, \"height\": 100}}\n",
            "{\"text\": \"no position\", \"frame\": {\"width\": 100, \"height\": 100}}\n",
        ),
    )
    .unwrap();

    let events = load_events(dir.path()).unwrap();
    assert_eq!(events.events.len(), 3);
    assert_eq!(events.skipped, 1);

    let machine = Arc::new(ScanStateMachine::default());
    let mut pipeline = DetectionPipeline::start(Arc::clone(&machine), PipelineOptions::default()).unwrap();
    for event in events.events {
        pipeline.submit(event);
    }
    let stats = pipeline.finish().unwrap();

    let result = machine.current_result().unwrap();
    assert_eq!(result.text, "1234567890");
    assert!(!result.is_url);
    assert!(!machine.is_scanning());
    assert_eq!(stats.results_captured, 1);
    assert_eq!(stats.events_ignored, 1);
    assert_eq!(stats.events_rejected[&RejectReason::OutsideRegion], 1);
}

#[test]
fn reset_rearms_for_the_next_pipeline_run() {
    let machine = Arc::new(ScanStateMachine::default());
    let centered = |t: &str| DetectionEvent::new(t, Point { x: 30.0, y: 70.0 }, frame());

    let mut pipeline = DetectionPipeline::start(Arc::clone(&machine), PipelineOptions::default()).unwrap();
    pipeline.submit(centered("one"));
    pipeline.finish().unwrap();
    assert_eq!(machine.current_result().map(|r| r.text), Some("one".to_string()));

    machine.reset_scanning();
    assert_eq!(machine.state(), ScanState::armed());

    let mut pipeline = DetectionPipeline::start(Arc::clone(&machine), PipelineOptions::default()).unwrap();
    pipeline.submit(centered("two"));
    pipeline.finish().unwrap();
    assert_eq!(machine.current_result().map(|r| r.text), Some("two".to_string()));
}

#[test]
fn config_drives_filter_policy() {
    let cfg = ScannerConfig::from_toml_str("[filter]\nallow_empty_text = false\n").unwrap();
    let machine = ScanStateMachine::new(DetectionFilter::new(cfg.filter));
    let empty = DetectionEvent::new("", Point { x: 50.0, y: 50.0 }, frame());

    machine.on_detection(&empty);
    assert!(machine.is_scanning());

    let lenient = ScanStateMachine::new(DetectionFilter::new(FilterOptions::default()));
    lenient.on_detection(&empty);
    assert_eq!(lenient.current_result().map(|r| r.text), Some(String::new()));
}
