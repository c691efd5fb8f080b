use anyhow::{Context, Result};
use clap::Parser;
use dealflow::cli::{Cli, Commands, OutputFormat};
use dealflow::pipeline::{AnalysisPipeline, PipelineReport, RunRequest};
use dealflow::planner::Planner;
use dealflow::storage::{DioStore, FileDioStore, InMemoryDioStore};
use dealflow::{AnalyzerRegistry, DealOrchestrator, DealflowConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            deal_id,
            config,
            store,
            shadow,
            soft_caps,
            hard_gates,
            cycles,
            format,
        } => handle_analyze(
            &input, deal_id, &config, store, shadow, soft_caps, hard_gates, cycles, format,
        ),
        Commands::History {
            deal_id,
            store,
            format,
        } => handle_history(&deal_id, &store, format),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_analyze(
    input: &Path,
    deal_id: Option<String>,
    config_path: &Path,
    store_dir: Option<PathBuf>,
    shadow: bool,
    soft_caps: bool,
    hard_gates: bool,
    cycles: Option<u8>,
    format: OutputFormat,
) -> Result<()> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let input_data: serde_json::Value =
        serde_json::from_str(&contents).context("deal input is not valid JSON")?;

    let deal_id = deal_id
        .or_else(|| {
            input_data
                .get("deal_id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .context("no deal id: pass --deal-id or add a deal_id field to the input")?;

    let mut config = DealflowConfig::load(config_path)?;
    // CLI flags layer on top of the file; later stages imply shadow mode so
    // a single flag is enough to try a stage out.
    config.features.shadow_mode |= shadow || soft_caps || hard_gates;
    config.features.soft_caps |= soft_caps;
    config.features.hard_gates |= hard_gates;
    if let Some(cycles) = cycles {
        config.planner.max_cycles = cycles;
    }
    config.validate()?;

    let store: Arc<dyn DioStore> = match &store_dir {
        Some(dir) => Arc::new(FileDioStore::new(dir)?),
        None => Arc::new(InMemoryDioStore::new()),
    };

    let registry = Arc::new(AnalyzerRegistry::standard());
    let orchestrator = DealOrchestrator::new(registry, store, &config)?;
    let planner = Planner::new(config.planner.clone());

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .expect("static template is valid"),
    );
    bar.set_message(format!("analyzing {deal_id}"));
    let bar_for_pipeline = bar.clone();
    let pipeline = AnalysisPipeline::new(orchestrator, planner)
        .with_progress(move |percent| bar_for_pipeline.set_position(percent as u64));

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(pipeline.run(RunRequest {
        deal_id,
        input_data,
    }));
    bar.finish_and_clear();

    print_report(&report, format)?;
    if report.success {
        Ok(())
    } else {
        anyhow::bail!(report.error.unwrap_or_else(|| "analysis failed".to_string()))
    }
}

fn print_report(report: &PipelineReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Summary => {
            let Some(dio) = &report.final_dio else {
                println!("no DIO produced: {}", report.error.as_deref().unwrap_or("unknown"));
                return Ok(());
            };
            println!("deal:            {}", dio.deal_id);
            println!("final DIO:       {} (v{})", dio.dio_id, dio.version);
            println!("cycles:          {}", report.metrics.cycles_completed);
            println!("overall score:   {:.1}", dio.overall_score);
            println!(
                "coverage:        {:.0}% of analyzers ok ({} failed)",
                dio.coverage * 100.0,
                report.metrics.analyzers_failed
            );
            if let Some(inference) = &dio.phase_inference_v1 {
                println!(
                    "phase:           {} (confidence {:.2})",
                    inference.phase, inference.confidence
                );
            }
            if let Some(assessment) = &dio.fundability_assessment_v1 {
                if let Some(score) = assessment.fundability_score_0_100 {
                    println!("fundability:     {score:.1} (legacy {:.1})", assessment.legacy_overall_score_0_100);
                }
            }
            if let Some(decision) = &dio.fundability_decision_v1 {
                println!("gate outcome:    {:?}", decision.outcome);
                for request in &decision.next_requests {
                    println!("  next:          {request}");
                }
            }
            if let Some(pack) = &report.decision_pack {
                println!(
                    "recommendation:  {:?} (evidence: {})",
                    pack.recommendation, pack.evidence_count
                );
            }
            if let Some(reason) = report.state.stop_reason {
                println!("stop reason:     {reason:?}");
            }
        }
    }
    Ok(())
}

fn handle_history(deal_id: &str, store_dir: &Path, format: OutputFormat) -> Result<()> {
    let store = FileDioStore::new(store_dir)?;
    let history = store.dio_history(deal_id)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
        OutputFormat::Summary => {
            if history.is_empty() {
                println!("no versions stored for {deal_id}");
            }
            for dio in history {
                println!(
                    "v{:<3} {}  score {:5.1}  hash {}",
                    dio.version,
                    dio.created_at.format("%Y-%m-%d %H:%M:%S"),
                    dio.overall_score,
                    &dio.content_hash[..12.min(dio.content_hash.len())],
                );
            }
        }
    }
    Ok(())
}
