use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use claude_usage_exporter::{config::Config, logging, server, ClaudeUsageAnalyzer};
use tracing::info;

#[derive(Parser)]
#[command(name = "claude-usage-exporter")]
#[command(about = "Prometheus exporter for Claude usage statistics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve metrics over HTTP (default)
    Serve {
        /// Port to listen on, overrides EXPORTER_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one refresh and print the result
    Snapshot {
        /// Print the merged report as JSON instead of the text exposition
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    logging::init_logging(&config.logging);
    if let Some(path) = Config::find_config_file() {
        info!(config_file = %path.display(), "Loaded configuration from file");
    }

    let analyzer = ClaudeUsageAnalyzer::from_config(&config.sources);

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            server::serve(analyzer, port.unwrap_or(config.server.port)).await
        }
        Commands::Snapshot { json } => {
            let output = tokio::task::spawn_blocking(move || render_snapshot(&analyzer, json))
                .await
                .context("Refresh task failed")??;
            print!("{}", output);
            Ok(())
        }
    }
}

fn render_snapshot(analyzer: &ClaudeUsageAnalyzer, json: bool) -> Result<String> {
    let report = analyzer.refresh().context("Refresh failed")?;
    if json {
        let mut rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        rendered.push('\n');
        Ok(rendered)
    } else {
        let metrics = claude_usage_exporter::MetricsSnapshot::from_report(
            &report,
            &analyzer.source_info(),
        );
        Ok(metrics.encode_text())
    }
}
