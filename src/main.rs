mod api;
mod commands;
mod gateway;

use clap::{Parser, Subcommand};
use relay_core::{
    config::{self, Config, ConfigSource},
    context::Context,
    traits::Provider,
};
use relay_providers::OpenAiProvider;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "whatsrelay",
    version,
    about = "WhatsApp webhook relay to an OpenAI-compatible model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "WHATSRELAY_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Start,
    /// Validate configuration and print a summary.
    Check,
    /// Send a one-shot message to the model.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Send the diagnostic text to the configured test recipient.
    SendTest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Read the file before logging is up so the level and log dir apply.
    let (mut cfg, source) = config::load(&cli.config)?;
    cfg.apply_env_overrides();
    let _guard = init_logging(&cfg)?;
    if source == ConfigSource::Defaults {
        tracing::info!("config file not found at {}, using defaults", cli.config);
    }

    match cli.command {
        Commands::Start => {
            cfg.validate()?;
            let gateway = gateway::Gateway::from_config(&cfg)?;

            if !gateway.provider().is_available().await {
                tracing::warn!(
                    "provider '{}' did not answer the availability probe, starting anyway",
                    gateway.provider().name()
                );
            }
            if gateway.simulate() {
                tracing::warn!("WHATSAPP_TOKEN is FAKE: replies are logged, not sent");
            }

            tracing::info!(
                "{} starting in {:?} mode (model {})",
                cfg.relay.name,
                cfg.relay.mode,
                cfg.provider.model
            );
            api::serve(&cfg, Arc::new(gateway)).await?;
        }
        Commands::Check => {
            print_summary(&cli.config, source, &cfg);
            match cfg.validate() {
                Ok(()) => println!("\nConfiguration OK"),
                Err(e) => anyhow::bail!("{e}"),
            }
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: whatsrelay ask <message>");
            }
            if cfg.provider.api_key.is_empty() {
                anyhow::bail!(
                    "provider.api_key is empty. Set it in {} or GROQ_API_KEY env var.",
                    cli.config
                );
            }

            let prompt = message.join(" ");
            let provider = OpenAiProvider::from_config(&cfg.provider)?;
            let context = Context::new(&cfg.messages.system_prompt, &prompt);
            let completion = provider.complete(&context).await?;
            match completion.text {
                Some(text) => println!("{text}"),
                None => println!("{}", cfg.messages.empty_answer),
            }
        }
        Commands::SendTest => {
            cfg.validate()?;
            let Some(recipient) = cfg.whatsapp.test_recipient.clone().filter(|r| !r.is_empty())
            else {
                anyhow::bail!(
                    "whatsapp.test_recipient is empty. Set it in {} or WHATSAPP_TEST_TO env var.",
                    cli.config
                );
            };
            let gateway = gateway::Gateway::from_config(&cfg)?;
            match gateway.send_diagnostic(&recipient).await {
                gateway::DeliveryStatus::Failed(e) => anyhow::bail!("diagnostic send failed: {e}"),
                status => println!("diagnostic send: {status:?}"),
            }
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over `relay.log_level`.
///
/// When `relay.log_dir` is set, a daily-rotated file log is written next to
/// stderr output; the returned guard must live until exit to flush it.
fn init_logging(cfg: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.relay.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match cfg.relay.log_dir.as_deref().filter(|d| !d.is_empty()) {
        Some(dir) => {
            let dir = config::shellexpand(dir);
            std::fs::create_dir_all(&dir)
                .map_err(|e| anyhow::anyhow!("failed to create log dir {dir}: {e}"))?;
            let appender = tracing_appender::rolling::daily(&dir, "whatsrelay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

fn print_summary(path: &str, source: ConfigSource, cfg: &Config) {
    let set = |v: &str| if v.is_empty() { "missing" } else { "set" };
    println!("whatsrelay configuration check\n");
    match source {
        ConfigSource::File => println!("Config: {path}"),
        ConfigSource::Defaults => println!("Config: {path} (not found, using defaults)"),
    }
    println!("Mode: {:?}", cfg.relay.mode);
    println!("Listen: {}:{}", cfg.api.host, cfg.api.port);
    println!();
    println!("  verify_token:    {}", set(&cfg.whatsapp.verify_token));
    println!("  access_token:    {}", access_token_status(cfg));
    println!("  phone_number_id: {}", set(&cfg.whatsapp.phone_number_id));
    println!(
        "  app_secret:      {}",
        set(cfg.whatsapp.app_secret.as_deref().unwrap_or_default())
    );
    println!("  provider key:    {}", set(&cfg.provider.api_key));
    println!("  model:           {}", cfg.provider.model);
    println!("  history window:  {} turns", cfg.memory.max_turns);
    println!(
        "  mobile fixup:    {}",
        if cfg.identity_normalizer().fixup_enabled() {
            "on"
        } else {
            "off"
        }
    );
}

/// Summary label for the outbound access token.
fn access_token_status(cfg: &Config) -> &'static str {
    if cfg.whatsapp.simulate() {
        "simulate"
    } else if cfg.whatsapp.access_token.is_empty() {
        "missing"
    } else {
        "set"
    }
}
