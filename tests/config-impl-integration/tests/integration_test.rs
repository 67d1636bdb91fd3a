//! Centralized integration tests for config-impl
use anyhow::Result;
use async_trait::async_trait;
use config_abstractions::{
    Config, PollCallback, PollingScheduler, PropertyListener, Snapshot, SnapshotSource,
};
use config_impl::{
    CompositeConfig, DefaultDecoder, DynamicConfigManager, DynamicConfigSettings, Layer, Layers,
    MapConfig, MapSnapshotSource, PollOutcome, PollingSettings,
};
use infrastructure_common::ConfigError;
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 只在测试显式调用时轮询的调度器
#[derive(Default)]
struct ManualScheduler {
    running: AtomicBool,
    callback: Mutex<Option<PollCallback>>,
}

impl ManualScheduler {
    async fn tick(&self) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback().await;
        }
    }
}

#[async_trait]
impl PollingScheduler for ManualScheduler {
    async fn start(&self, callback: PollCallback) -> Result<(), ConfigError> {
        *self.callback.lock().unwrap() = Some(callback);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.callback.lock().unwrap().take();
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "manual"
    }
}

/// 模拟远程配置中心，返回 JSON 文本解析出的完整快照
struct JsonDocumentSource {
    document: Mutex<String>,
}

impl JsonDocumentSource {
    fn new(document: &str) -> Self {
        Self {
            document: Mutex::new(document.to_string()),
        }
    }

    fn publish(&self, document: &str) {
        *self.document.lock().unwrap() = document.to_string();
    }
}

#[async_trait]
impl SnapshotSource for JsonDocumentSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, ConfigError> {
        let document = self.document.lock().unwrap().clone();
        Ok(serde_json::from_str(&document)?)
    }

    fn name(&self) -> &str {
        "json-document"
    }
}

fn manager() -> Result<DynamicConfigManager> {
    Ok(DynamicConfigManager::new(DynamicConfigSettings::default())?)
}

#[tokio::test]
async fn test_custom_scheduler_drives_polling_source() -> Result<()> {
    let manager = manager()?;
    let source = Arc::new(MapSnapshotSource::new("remote-source"));
    source.set_property("ads.cpm.floor", "1.5");
    let scheduler = Arc::new(ManualScheduler::default());

    let polling = manager
        .add_polling_source_with("remote", source.clone(), Layers::REMOTE, scheduler.clone())
        .await?;
    assert!(polling.is_empty(), "手动调度器不做首次轮询");

    let floor = manager.factory().get_double_property("ads.cpm.floor");
    assert_eq!(floor.get_or(0.0), 0.0);

    scheduler.tick().await;
    assert_eq!(floor.get_or(0.0), 1.5);
    assert_eq!(source.fetch_count(), 1);

    manager.remove_layer("remote")?;
    assert!(!scheduler.is_running());
    assert_eq!(floor.get_or(0.0), 0.0);
    Ok(())
}

#[tokio::test]
async fn test_source_parse_failure_is_reported_as_error() -> Result<()> {
    struct ErrorCounter(AtomicUsize);

    impl config_abstractions::ConfigListener for ErrorCounter {
        fn on_config_updated(&self, _config: &dyn Config) {}

        fn on_error(&self, _error: &ConfigError, _config: &dyn Config) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let manager = manager()?;
    let source = Arc::new(JsonDocumentSource::new(r#"{"ads.region": "eu"}"#));
    manager
        .add_polling_source("remote", source.clone(), Layers::REMOTE)
        .await?;

    let errors = Arc::new(ErrorCounter(AtomicUsize::new(0)));
    manager.config().add_listener(errors.clone());

    source.publish("{not json");
    let outcome = manager.poll_now("remote").await?;
    assert!(matches!(outcome, PollOutcome::Failed { .. }));
    assert_eq!(errors.0.load(Ordering::SeqCst), 1);
    assert_eq!(
        manager.factory().get_string_property("ads.region").get(),
        Some("eu".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_structured_property_with_registered_decoder() -> Result<()> {
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Pacing {
        budget: u64,
        spread: bool,
    }

    let mut decoder = DefaultDecoder::new();
    decoder.register_deserialize::<Pacing>();
    let manager = DynamicConfigManager::with_decoder(
        DynamicConfigSettings::default(),
        Arc::new(decoder),
    )?;

    let source = Arc::new(JsonDocumentSource::new(
        r#"{"ads.pacing": {"budget": 1000, "spread": true}}"#,
    ));
    manager
        .add_polling_source("remote", source.clone(), Layers::REMOTE)
        .await?;

    let pacing = manager.property::<Pacing>("ads.pacing");
    assert_eq!(
        pacing.get(),
        Some(Pacing {
            budget: 1000,
            spread: true
        })
    );

    source.publish(r#"{"ads.pacing": "{\"budget\": 5, \"spread\": false}"}"#);
    manager.poll_now("remote").await?;
    assert_eq!(pacing.get().map(|p| p.budget), Some(5));

    assert!(manager.try_property::<Arc<Pacing>>("ads.pacing").is_err());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_polling_source_is_rejected() -> Result<()> {
    let manager = manager()?;
    manager
        .add_polling_source(
            "remote",
            Arc::new(MapSnapshotSource::new("a")),
            Layers::REMOTE,
        )
        .await?;

    let error = manager
        .add_polling_source(
            "remote",
            Arc::new(MapSnapshotSource::new("b")),
            Layers::REMOTE,
        )
        .await
        .unwrap_err();
    assert!(matches!(error, ConfigError::DuplicateLayer { .. }));
    Ok(())
}

#[tokio::test]
async fn test_fixed_delay_scheduler_refreshes_in_background() -> Result<()> {
    let settings = DynamicConfigSettings {
        polling: PollingSettings::with_interval(Duration::from_millis(20)),
        ..DynamicConfigSettings::default()
    };
    let manager = DynamicConfigManager::new(settings)?;
    let source = Arc::new(MapSnapshotSource::new("remote-source"));
    source.set_property("ads.version", "1");
    manager
        .add_polling_source("remote", source.clone(), Layers::REMOTE)
        .await?;

    let version = manager.factory().get_int_property("ads.version");
    assert_eq!(version.get_or(0), 1);

    source.set_property("ads.version", "2");
    let mut observed = 0;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        observed = version.get_or(0);
        if observed == 2 {
            break;
        }
    }
    assert_eq!(observed, 2);

    manager.shutdown();
    let fetches = source.fetch_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.fetch_count(), fetches);
    Ok(())
}

#[test]
fn test_nested_composites_share_invalidation() -> Result<()> {
    let manager = manager()?;
    let library = CompositeConfig::new("library");
    library.add_layer(
        Arc::new(MapConfig::new("lib-a").with_property("ads.retries", "1")),
        Layers::LIBRARY,
    )?;
    manager.add_layer(library.clone(), Layers::LIBRARY)?;

    let retries = manager.factory().get_int_property("ads.retries");
    assert_eq!(retries.get_or(0), 1);

    library.add_layer(
        Arc::new(MapConfig::new("lib-b").with_property("ads.retries", "3")),
        Layers::LIBRARY,
    )?;
    assert_eq!(retries.get_or(0), 3, "同级反转层后加入者优先");

    manager.add_layer(
        Arc::new(MapConfig::new("app").with_property("ads.retries", "5")),
        Layer::new("app", 800),
    )?;
    assert_eq!(retries.get_or(0), 5);
    Ok(())
}

#[test]
fn test_listener_trait_object_receives_changes() -> Result<()> {
    struct Recorder(Mutex<Vec<String>>);

    struct RecorderHandle(Arc<Recorder>);

    impl PropertyListener<String> for RecorderHandle {
        fn on_change(&self, value: String) {
            self.0 .0.lock().unwrap().push(value);
        }
    }

    let manager = manager()?;
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let subscription = manager
        .factory()
        .get_string_property("ads.channel")
        .subscribe("none".to_string(), RecorderHandle(recorder.clone()));

    manager.set_override("ads.channel", "video");
    manager.set_override("ads.channel", "video");
    manager.set_override("ads.channel", Value::from("native"));
    subscription.unsubscribe();
    manager.set_override("ads.channel", "banner");

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec!["none", "video", "native"]
    );
    Ok(())
}

#[test]
fn test_settings_file_feeds_manager() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(file, "root_name = \"ads-root\"\n[polling]\ninterval_ms = 1000")?;

    let settings = DynamicConfigSettings::load(Some(file.path()))?;
    let manager = DynamicConfigManager::new(settings)?;
    assert_eq!(manager.config().name(), "ads-root");
    assert_eq!(manager.settings().polling.interval(), Duration::from_secs(1));
    Ok(())
}
