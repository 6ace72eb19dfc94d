//! Configuration flowing into the event manager and logging setup.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tidings_config::{Config, ConfigError, ConfigLayer, loader};
use tidings_events::{DispatchPolicy, EventManager, ManagerOptions};
use tidings_telemetry::{LogConfig, LogFormat, build_subscriber_with_writer};
use tidings_test::{CallLog, wait_for};

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn test_file_and_env_configure_manager() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join("config.toml"),
        "[bus]\ndefault_channel = \"main\"\n",
    )
    .unwrap();
    let env = env(&[
        ("TIDINGS_WORKER_THREADS", "2"),
        ("TIDINGS_WORKER_THREAD_NAME", "cfg-worker"),
        ("TIDINGS_DEFAULT_CHANNEL", "ignored"),
    ]);

    let resolved = loader::load_with_env(None, Some(home.path()), &env).unwrap();
    assert_eq!(
        resolved.source_of("bus.default_channel"),
        Some(&ConfigLayer::User)
    );
    assert_eq!(
        resolved.source_of("bus.worker_threads"),
        Some(&ConfigLayer::Environment)
    );

    let manager = EventManager::from_config(&resolved.config);
    assert_eq!(manager.default_channel(), "main");
    assert_eq!(manager.worker_pool().options().worker_threads, 2);

    let bus = manager.event::<u8>();
    let log = CallLog::new();
    let sink = log.clone();
    bus.subscribe(DispatchPolicy::NewThread, move |_| sink.record("pooled"));
    bus.publish(1);

    assert!(wait_for(common::WAIT, || log.len() == 1));
    assert_eq!(log.thread_names()[0].as_deref(), Some("cfg-worker"));
    assert_eq!(bus.subscriber_count("main"), 1);
}

#[test]
fn test_bus_section_converts_to_options() {
    let config = Config::from_toml_str(concat!(
        "[bus]\n",
        "default_channel = \"alerts\"\n",
        "worker_threads = 3\n",
        "worker_thread_name = \"alerts-worker\"\n",
    ))
    .unwrap();

    let options = ManagerOptions::from(&config.bus);
    assert_eq!(
        options,
        ManagerOptions::default()
            .with_default_channel("alerts")
            .with_worker_threads(3)
            .with_worker_thread_name("alerts-worker")
    );
}

#[test]
fn test_default_config_matches_default_options() {
    let config = Config::default();
    assert_eq!(ManagerOptions::from(&config.bus), ManagerOptions::default());
}

#[test]
fn test_invalid_config_never_reaches_manager() {
    let err = Config::from_toml_str("[bus]\nworker_threads = 0\n").unwrap_err();
    match err {
        ConfigError::ValidationError { field, .. } => assert_eq!(field, "bus.worker_threads"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl std::io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_logging_section_drives_subscriber() {
    let config = Config::from_toml_str(
        "[logging]\nlevel = \"warn\"\nformat = \"json\"\ndirectives = [\"tidings_events=debug\"]\n",
    )
    .unwrap();
    let log_config = LogConfig::try_from(&config.logging).unwrap();
    assert_eq!(log_config.format, LogFormat::Json);

    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber =
        build_subscriber_with_writer(&log_config.without_timestamps(), move || writer.clone())
            .unwrap();

    tracing::subscriber::with_default(subscriber, || {
        let manager = EventManager::new();
        let bus = manager.event::<i32>();
        let sub = bus.subscribe_to("audit", DispatchPolicy::PublishThread, |_| {}).unwrap();
        bus.subscribe(DispatchPolicy::PublishThread, |_| panic!("subscriber failure"));
        bus.publish(1);
        sub.unsubscribe();
        tracing::info!("application info is below the warn level");
    });

    let output = capture.contents();
    assert!(output.contains("Subscription registered"));
    assert!(output.contains("Subscription removed"));
    assert!(output.contains("Subscriber panicked"));
    assert!(output.contains("subscriber failure"));
    assert!(!output.contains("application info"));
}

#[test]
fn test_unknown_log_format_is_rejected_by_bridge() {
    let section = tidings_config::LoggingSection {
        format: "xml".to_owned(),
        ..tidings_config::LoggingSection::default()
    };
    assert!(LogConfig::try_from(&section).is_err());
}
