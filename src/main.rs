use choropleth::{classify::ThresholdScale, config, data, format, render, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the choropleth map to SVG
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render the map, then serve it with the hover API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print the bucket each value falls into
    Classify {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config } => {
            tracing::info!("Rendering map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let scale = ThresholdScale::from_config(&app_config.classification)?;

            // 1. Load Data
            let regions = data::load_data(&app_config).await?;

            // 2. Classify and render
            render::render_map(&app_config, &scale, &regions)?;

            tracing::info!("Render complete!");
        }
        Commands::Serve { config } => {
            tracing::info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let scale = ThresholdScale::from_config(&app_config.classification)?;

            let regions = data::load_data(&app_config).await?;
            render::render_map(&app_config, &scale, &regions)?;

            server::start_server(app_config, regions).await?;
        }
        Commands::Classify { config, values } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let scale = ThresholdScale::from_config(&app_config.classification)?;

            for value in values {
                let bucket = scale.classify(*value);
                println!("{}\t{}\t{}", format::format_value(*value), bucket, scale.label(bucket));
            }
        }
    }

    Ok(())
}
