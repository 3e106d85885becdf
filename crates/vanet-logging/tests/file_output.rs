//! JSONL file output end to end
//!
//! One global subscriber per process, so this binary holds a single test.

use std::time::Duration;

use vanet_core::NodeId;
use vanet_logging::{FileConfig, LogConfig, NodeContextGuard, RotationStrategy, SubscriberBuilder};

#[test]
fn test_jsonl_file_carries_node_context() {
    let dir = std::env::temp_dir().join(format!("vanet-logging-{}", std::process::id()));
    let file = FileConfig {
        directory: dir.clone(),
        prefix: "run".to_string(),
        rotation: RotationStrategy::Never,
    };
    let config = LogConfig {
        default_level: "info".to_string(),
        ..LogConfig::default()
    };

    let guard = SubscriberBuilder::new()
        .with_config(config)
        .with_console(false)
        .with_file_output(file)
        .init()
        .unwrap();
    assert!(guard.is_some());

    {
        let _node = NodeContextGuard::enter(NodeId(7), Duration::from_millis(1500));
        tracing::info!(face = 263, "Interest forwarded");
    }
    drop(guard);

    let contents = std::fs::read_to_string(dir.join("run.jsonl")).unwrap();
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let event = events
        .iter()
        .find(|e| e["message"] == "Interest forwarded")
        .expect("event written");
    assert_eq!(event["face"], 263);
    assert_eq!(event["span"]["name"], "node");
    assert_eq!(event["span"]["node"], "7");

    let _ = std::fs::remove_dir_all(dir);
}
