use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use consumer_config::{AppConfig, ConfigValidator, LogFormat, LogLevel, LoggingConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;

use app::{send_message, Application};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    apply_overrides(&mut config, &matches)?;
    init_logging(&config.logging)?;

    match matches.subcommand() {
        Some(("send", sub)) => {
            let routing_key = sub
                .get_one::<String>("routing-key")
                .context("缺少路由键")?;
            let body = sub.get_one::<String>("message").context("缺少消息内容")?;
            send_message(&config, routing_key, body).await
        }
        _ => consume(config).await,
    }
}

fn build_cli() -> Command {
    Command::new("consumer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("AMQP 消息分发消费者")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "text"])
                .global(true),
        )
        .arg(
            Arg::new("queue")
                .short('q')
                .long("queue")
                .value_name("QUEUE")
                .help("消费的队列名称")
                .global(true),
        )
        .subcommand(Command::new("consume").about("消费队列中的消息（默认）"))
        .subcommand(
            Command::new("send")
                .about("向交换机发布一条 YAML 消息")
                .arg(
                    Arg::new("routing-key")
                        .short('r')
                        .long("routing-key")
                        .value_name("KEY")
                        .help("路由键，通常为目标队列名称")
                        .required(true),
                )
                .arg(
                    Arg::new("message")
                        .value_name("YAML")
                        .help("YAML 格式的消息内容")
                        .required(true),
                ),
        )
}

/// 命令行参数覆盖配置文件与环境变量
fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.parse::<LogFormat>().map_err(anyhow::Error::msg)?;
    }
    if let Some(queue) = matches.get_one::<String>("queue") {
        if queue.trim().is_empty() {
            return Err(anyhow::anyhow!("队列名称不能为空"));
        }
        config.consumer.queue = Some(queue.clone());
    }
    config.consumer.validate()?;
    Ok(())
}

/// 初始化日志系统
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
            .context("初始化Text日志格式失败")?,
    }

    Ok(())
}

async fn consume(config: AppConfig) -> Result<()> {
    info!("启动消息消费者");

    let mut app = Application::new(&config)?;

    let shutdown = app.shutdown_handle();
    let signal_handle = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("收到关闭信号，开始优雅关闭...");
        shutdown.trigger();
    });

    let run_result = app.run().await;
    signal_handle.abort();

    match tokio::time::timeout(Duration::from_secs(30), app.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("关闭消费连接失败: {e}"),
        Err(_) => warn!("关闭消费连接超时"),
    }

    match run_result {
        Ok(()) => {
            info!("消费者已优雅关闭");
            Ok(())
        }
        Err(e) => {
            if e.is_fatal() {
                error!("消费者无法启动，请检查配置与凭据: {}", e);
            } else if e.is_broker_failure() {
                error!("消息代理不可用，队列 {} 的消费已停止: {}", app.queue(), e);
            } else {
                error!("队列 {} 的消息处理失败: {}", app.queue(), e);
            }
            let hint = format!("{}，队列: {}", e.user_message(), app.queue());
            Err(anyhow::Error::from(e).context(hint))
        }
    }
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_consume() {
        let matches = build_cli().try_get_matches_from(["consumer"]).unwrap();
        assert!(matches.subcommand().is_none());
        assert!(matches.get_one::<String>("config").is_none());
    }

    #[test]
    fn test_overrides_applied() {
        let matches = build_cli()
            .try_get_matches_from([
                "consumer", "-l", "debug", "--log-format", "json", "-q", "jobs", "consume",
            ])
            .unwrap();
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &matches).unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.consumer.queue.as_deref(), Some("jobs"));
    }

    #[test]
    fn test_blank_queue_rejected() {
        let matches = build_cli()
            .try_get_matches_from(["consumer", "--queue", " "])
            .unwrap();
        let mut config = AppConfig::default();
        assert!(apply_overrides(&mut config, &matches).is_err());
    }

    #[test]
    fn test_long_queue_override_rejected() {
        let long_queue = "q".repeat(256);
        let matches = build_cli()
            .try_get_matches_from(["consumer", "--queue", long_queue.as_str()])
            .unwrap();
        let mut config = AppConfig::default();
        assert!(apply_overrides(&mut config, &matches).is_err());

        let queue = "q".repeat(255);
        let matches = build_cli()
            .try_get_matches_from(["consumer", "--queue", queue.as_str()])
            .unwrap();
        apply_overrides(&mut config, &matches).unwrap();
        assert_eq!(config.consumer.queue.as_deref(), Some(queue.as_str()));
    }

    #[test]
    fn test_send_requires_routing_key() {
        assert!(build_cli()
            .try_get_matches_from(["consumer", "send", "MSG_TYPE: A"])
            .is_err());

        let matches = build_cli()
            .try_get_matches_from(["consumer", "send", "-r", "f_consume", "MSG_TYPE: A"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "send");
        assert_eq!(sub.get_one::<String>("routing-key").unwrap(), "f_consume");
    }
}
