use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tomato_scan::{AnalysisMode, AnalysisRequest, Analyzer, Args, draw_detections};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.to_config().context("failed to read label file")?;

    let analyzer = Analyzer::new(config);
    let request = AnalysisRequest::new(&args.source, args.mode);
    let report = analyzer
        .analyze(&request)
        .with_context(|| format!("failed to analyze {}", args.source.display()))?;

    if let Some(output) = &args.output {
        if args.mode == AnalysisMode::Segmentation {
            draw_detections(&args.source, &report.detections, output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!(path = %output.display(), "annotated image written");
        } else {
            tracing::warn!("--output only applies to segmentation, ignoring");
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
