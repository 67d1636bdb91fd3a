//! # 示例应用程序
//!
//! 演示 Lorn ADSP 动态配置运行时：分层配置、快照轮询、类型化属性与变更监听

use anyhow::Result;
use clap::Parser;
use config_abstractions::{EventListener, PropertyEvent};
use config_impl::{
    DynamicConfigManager, DynamicConfigSettings, Layers, MapConfig, MapSnapshotSource,
};
use infrastructure_common::init_logging;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "Lorn ADSP 动态配置示例应用")]
struct Args {
    /// 运行时设置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖设置文件中的值
    #[arg(long)]
    log_level: Option<String>,

    /// 模拟远程配置变更的次数
    #[arg(long, default_value_t = 3)]
    ticks: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = DynamicConfigSettings::load(args.config.as_deref())?;
    if let Some(level) = &args.log_level {
        settings.logging = settings.logging.with_level(level.clone());
    }
    init_logging(&settings.logging)?;

    info!("启动 Lorn ADSP 动态配置示例应用");
    let manager = DynamicConfigManager::new(settings)?;

    manager.add_layer(
        Arc::new(
            MapConfig::new("defaults")
                .with_property("ads.timeout_ms", "200")
                .with_property("ads.channels", "banner,video")
                .with_property("ads.enabled", "true"),
        ),
        Layers::DEFAULT,
    )?;

    let remote = Arc::new(MapSnapshotSource::new("simulated-remote"));
    remote.set_property("ads.timeout_ms", "150");
    manager
        .add_polling_source("remote", remote.clone(), Layers::REMOTE)
        .await?;

    demonstrate_properties(&manager, &remote, args.ticks).await?;

    println!("{}", manager.dump().to_json()?);

    manager.shutdown();
    info!("应用已关闭");
    Ok(())
}

/// 演示类型化属性读取与变更监听
async fn demonstrate_properties(
    manager: &DynamicConfigManager,
    remote: &MapSnapshotSource,
    ticks: u32,
) -> Result<()> {
    let timeout = manager.factory().get_duration_property("ads.timeout_ms");
    let channels = manager.property::<Vec<String>>("ads.channels");
    let enabled = manager.factory().get_bool_property("ads.enabled");

    info!(
        "初始配置: timeout={:?}, channels={:?}, enabled={}",
        timeout.get_or(Duration::from_millis(100)),
        channels.get_or_else(Vec::new),
        enabled.get_or(false)
    );

    let subscription = timeout.subscribe(
        Duration::from_millis(100),
        EventListener::new(|event: PropertyEvent<'_, Duration>| match event {
            PropertyEvent::Changed(value) => info!("超时配置变更: {:?}", value),
            PropertyEvent::ParseError(error) => warn!("超时配置无法解析，沿用旧值: {}", error),
        }),
    );

    for tick in 1..=ticks {
        if tick % 3 == 0 {
            remote.set_property("ads.timeout_ms", "not-a-number");
        } else {
            remote.set_property("ads.timeout_ms", (150 + tick * 50).to_string());
        }
        let outcome = manager.poll_now("remote").await?;
        info!("第 {} 次轮询: {:?}", tick, outcome);
    }

    manager.set_override("ads.enabled", "off");
    info!("运行时覆盖后 enabled={}", enabled.get_or(true));

    subscription.unsubscribe();
    Ok(())
}
