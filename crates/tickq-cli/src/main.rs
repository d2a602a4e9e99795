use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tickq", about = "Task queue backend with named recurring schedules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server and runner loop
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the status of a named schedule
    Status {
        /// Schedule name
        name: String,
    },
    /// Check configuration and print a summary
    Health,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let config = tickq_config::load_config().unwrap_or_default();
                tickq_gateway::start_gateway(config, port)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))
            })?;
        }
        Commands::Status { name } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let config = tickq_config::load_config().unwrap_or_default();
                let store = tickq_store::TickqStore::open(&config.resolve_db_path()?)?;
                let status = tickq_sched::status::status(&store, &name).await?;
                println!("{}", serde_json::to_string_pretty(&status)?);
                anyhow::Ok(())
            })?;
        }
        Commands::Health => {
            let config = tickq_config::load_config().unwrap_or_default();
            println!("tickq is healthy");
            println!("  gateway: {}:{}", config.gateway.host, config.gateway.port);
            println!("  auto-create schedule: {}", config.scheduler.auto_create);
            println!(
                "  default schedule: {} -> {} (every {} seconds)",
                config.scheduler.default_name,
                config.scheduler.default_target,
                config.scheduler.default_interval_secs,
            );
        }
    }

    Ok(())
}
