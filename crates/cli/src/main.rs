use anyhow::Result;
use clap::{Parser, Subcommand};
use marketbridge_api::AppState;
use marketbridge_core::{BrokerConfig, UpstreamConfig, DEFAULT_UPSTREAM_URL};
use marketbridge_data::BrokerageDataSource;
use marketbridge_queue::{
    AckMode, ConsumerOptions, LogHandler, QueueConsumer, RabbitPublisher, ReconnectConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "marketbridge")]
#[command(about = "REST facade over public market data, plus RabbitMQ publish/consume tools")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Upstream brokerage API base URL
    #[arg(long, env = "MARKETBRIDGE_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    upstream_url: String,

    /// Upstream connect timeout in seconds
    #[arg(long, env = "MARKETBRIDGE_CONNECT_TIMEOUT_SECS", default_value = "5")]
    connect_timeout_secs: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "MARKETBRIDGE_REQUEST_TIMEOUT_SECS", default_value = "15")]
    request_timeout_secs: u64,

    /// RabbitMQ host
    #[arg(long, env = "RABBITMQ_HOST", default_value = "rabbitmq")]
    rabbitmq_host: String,

    /// RabbitMQ port
    #[arg(long, env = "RABBITMQ_PORT", default_value = "5672")]
    rabbitmq_port: u16,

    /// RabbitMQ user (falls back to RABBITMQ_DEFAULT_USER)
    #[arg(long, env = "RABBITMQ_USER")]
    rabbitmq_user: Option<String>,

    /// RabbitMQ password (falls back to RABBITMQ_DEFAULT_PASS)
    #[arg(long, env = "RABBITMQ_PASS", hide_env_values = true)]
    rabbitmq_pass: Option<String>,

    /// RabbitMQ virtual host
    #[arg(long, env = "RABBITMQ_VHOST", default_value = "/")]
    rabbitmq_vhost: String,

    /// RabbitMQ connect timeout in seconds
    #[arg(long, env = "RABBITMQ_CONNECT_TIMEOUT_SECS", default_value = "5")]
    rabbitmq_connect_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Server {
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0:8000")]
        bind: String,
    },

    /// Consume a queue and log every message
    Consume {
        /// Queue to consume
        #[arg(short, long, default_value = "test_queue")]
        queue: String,

        /// When to acknowledge deliveries (auto, after-handle)
        #[arg(long, default_value = "auto")]
        ack_mode: AckMode,

        /// Give up after this many consecutive reconnects (0 = never)
        #[arg(long, default_value = "0")]
        max_attempts: u32,
    },

    /// Publish one message and exit
    Publish {
        /// Target queue
        #[arg(short, long, default_value = "test_queue")]
        queue: String,

        /// Message text
        #[arg(short, long)]
        message: String,
    },
}

impl Cli {
    fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            base_url: self.upstream_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    fn broker_config(&self, lookup: impl Fn(&str) -> Option<String>) -> BrokerConfig {
        let defaults = BrokerConfig::default();
        BrokerConfig {
            host: self.rabbitmq_host.clone(),
            port: self.rabbitmq_port,
            username: self
                .rabbitmq_user
                .clone()
                .or_else(|| lookup("RABBITMQ_DEFAULT_USER"))
                .unwrap_or(defaults.username),
            password: self
                .rabbitmq_pass
                .clone()
                .or_else(|| lookup("RABBITMQ_DEFAULT_PASS"))
                .unwrap_or(defaults.password),
            vhost: self.rabbitmq_vhost.clone(),
            connect_timeout: Duration::from_secs(self.rabbitmq_connect_timeout_secs),
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let upstream = cli.upstream_config();
    let broker = cli.broker_config(|key| std::env::var(key).ok());
    tracing::debug!(?broker, "Broker configuration");

    match cli.command {
        Commands::Server { bind } => {
            tracing::info!(upstream = %upstream.base_url, "Using upstream market-data API");
            let market = BrokerageDataSource::from_config(&upstream)?;
            let publisher = RabbitPublisher::new(broker);
            let state = AppState::new(Arc::new(market), Arc::new(publisher));
            marketbridge_api::start_server(state, &bind).await?;
        }
        Commands::Consume {
            queue,
            ack_mode,
            max_attempts,
        } => {
            run_consumer(broker, queue, ack_mode, max_attempts).await?;
        }
        Commands::Publish { queue, message } => {
            RabbitPublisher::new(broker)
                .publish_message(&queue, &message)
                .await?;
            println!("Message published to {}", queue);
        }
    }

    Ok(())
}

async fn run_consumer(
    broker: BrokerConfig,
    queue: String,
    ack_mode: AckMode,
    max_attempts: u32,
) -> Result<()> {
    let mut options = ConsumerOptions::new(queue);
    options.ack_mode = ack_mode;
    options.reconnect = ReconnectConfig {
        max_attempts,
        ..Default::default()
    };
    let consumer = QueueConsumer::new(broker, options);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        trigger.cancel();
    });

    tracing::info!(
        queue = %consumer.options().queue,
        ack_mode = %consumer.options().ack_mode,
        "Starting consumer"
    );
    consumer.run(&LogHandler, cancel).await?;
    Ok(())
}
