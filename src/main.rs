use chart_sniper::ai::OpenAiClient;
use chart_sniper::config::{AppConfig, ChartJob, load_config};
use chart_sniper::model::{AnalysisRequest, AnalysisResult};
use chart_sniper::ocr::TesseractEngine;
use chart_sniper::AnalysisOrchestrator;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chart_sniper=info")),
        )
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: AppConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };

    let engine = TesseractEngine::new(&config.ocr);
    match engine.version().await {
        Ok(version) => info!("🔎 OCR engine ready: {}", version),
        Err(e) => warn!("OCR engine unavailable, charts will be analyzed without text: {}", e),
    }

    let reasoning = match OpenAiClient::new(&config.ai) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize reasoning client: {}", e);
            return;
        }
    };
    if config.ai.api_key.is_none() {
        warn!("No API key configured; every chart will fall back to HOLD");
    }

    let orchestrator = AnalysisOrchestrator::new(&config, Arc::new(engine), Arc::new(reasoning));

    info!("Charts to analyze: {}", config.charts.len());
    let tasks: Vec<_> = config
        .charts
        .iter()
        .map(|job| process_chart(job, &config, &orchestrator))
        .collect();
    let results: Vec<AnalysisResult> = join_all(tasks).await.into_iter().flatten().collect();

    match serde_json::to_string_pretty(&results) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize results: {}", e),
    }
    info!("Finished: {} of {} charts analyzed", results.len(), config.charts.len());
}

/// Reads one configured chart and runs it through the pipeline.
/// Returns `None` when the chart could not be turned into a request.
async fn process_chart(
    job: &ChartJob,
    config: &AppConfig,
    orchestrator: &AnalysisOrchestrator,
) -> Option<AnalysisResult> {
    info!("Processing chart: {}", job.image_path.display());

    let image = match tokio::fs::read(&job.image_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read {}: {}", job.image_path.display(), e);
            return None;
        }
    };

    let request = match AnalysisRequest::new(
        image,
        job.symbol,
        job.timeframe,
        job.trade_type,
        &job.notes,
        &config.limits,
    ) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected {}: {}", job.image_path.display(), e);
            return None;
        }
    };

    Some(orchestrator.analyze(request).await)
}
