use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use relayrs::bootstrap::{self, EvalsOptions, LabelOptions};
use relayrs::cache::LastRunCache;
use relayrs::evals::{self, EvalsResult};
use relayrs::label::{self, LabelReport};
use relayrs::pipeline::{PipelineInput, PipelineRun, ProgressReporter, ProgressUpdate, Stage};
use relayrs::{AppConfig, render, ui};

mod args;
use args::{CliArgs, Command, RequirementsSource, USAGE};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    ui::init_logging();

    let cli = match CliArgs::parse() {
        Ok(cli) => cli,
        Err(e) => {
            ui::error(e.to_string());
            eprintln!("\n{USAGE}");
            return Ok(ExitCode::from(2));
        }
    };
    let config = AppConfig::load().context("loading .relayrs/config.json")?;

    match &cli.command {
        Command::Help => {
            println!("{USAGE}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Templates => {
            list_templates();
            Ok(ExitCode::SUCCESS)
        }
        Command::Last { pipeline } => show_last(&config, pipeline),
        Command::Label { image } => run_label(&cli, &config, image).await,
        Command::Evals { source } => run_evals(&cli, &config, source).await,
    }
}

fn list_templates() {
    ui::section_title("Templates");
    for template in evals::TEMPLATES {
        println!("  {}\n    {}", template.name, template.requirements);
    }
    ui::section_title("Models");
    for option in evals::MODEL_OPTIONS {
        println!("  {:<22} {}", option.label, option.id);
    }
}

fn show_last(config: &AppConfig, pipeline: &str) -> Result<ExitCode> {
    let cache = LastRunCache::new(&config.paths.cache_dir);
    let Some(run) = cache.load(pipeline)? else {
        ui::warn(format!("no cached {pipeline} run in {}", cache.dir().display()));
        return Ok(ExitCode::FAILURE);
    };
    ui::info(format!(
        "{} run {} from {}",
        run.pipeline,
        run.run_id,
        run.started_at.format("%Y-%m-%d %H:%M UTC")
    ));
    match pipeline {
        label::PIPELINE => {
            if let Some(report) = LabelReport::from_run(&run) {
                ui::markdown(&report.report);
            }
        }
        _ => {
            if let Some(result) = EvalsResult::from_run(&run) {
                ui::section_title("Evaluation Framework");
                ui::markdown(&result.framework);
                ui::section_title("Evaluation Plan");
                ui::markdown(&result.plan);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Ctrl-C cancels before the next stage starts.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ui::warn("cancelling after the current stage...");
            child.cancel();
        }
    });
    token
}

fn reporter(quiet: bool) -> ProgressReporter {
    if quiet {
        ProgressReporter::silent()
    } else {
        ProgressReporter::new(Arc::new(|update: &ProgressUpdate| ui::progress(update)))
    }
}

async fn execute(
    cli: &CliArgs,
    config: &AppConfig,
    pipeline: &str,
    input: &PipelineInput,
    stages: &[Arc<dyn Stage>],
) -> Result<Option<PipelineRun>> {
    let coordinator = bootstrap::coordinator(config);
    let progress = reporter(cli.quiet);
    let cancel = cancel_on_ctrl_c();

    let run = match coordinator
        .execute(pipeline, input, stages, &progress, &cancel)
        .await
    {
        Ok(run) => run,
        Err(e) => {
            ui::error(e.to_string());
            return Ok(None);
        }
    };

    if !cli.quiet {
        for entry in &run.entries {
            ui::stage_entry(entry);
        }
    }
    if let Some(message) = run.failure_message() {
        ui::error(message);
        return Ok(None);
    }
    if let Err(e) = LastRunCache::new(&config.paths.cache_dir).save(&run) {
        log::warn!("could not cache run: {e}");
    }
    Ok(Some(run))
}

fn out_dir(cli: &CliArgs, config: &AppConfig) -> PathBuf {
    cli.out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.paths.out_dir))
}

async fn run_label(cli: &CliArgs, config: &AppConfig, image: &Path) -> Result<ExitCode> {
    let Some(mime_type) = label::mime_type_for(image) else {
        bail!("{}: expected a .png, .jpg or .jpeg image", image.display());
    };
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;

    let options = LabelOptions {
        model: cli.model.clone(),
    };
    let prepared = match bootstrap::label_pipeline(config, &options) {
        Ok(prepared) => prepared,
        Err(e) => {
            ui::error(e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };
    let models = &prepared.models;
    if !cli.quiet {
        ui::header(
            label::PIPELINE,
            &[
                ("vision", models.vision.as_str()),
                ("linguist", models.linguist.as_str()),
                ("research", models.research.as_str()),
                ("nutritionist", models.nutritionist.as_str()),
            ],
        );
    }

    let input = models.apply(PipelineInput::image(bytes, mime_type));
    let Some(run) = execute(cli, config, label::PIPELINE, &input, &prepared.stages).await? else {
        return Ok(ExitCode::FAILURE);
    };
    let Some(report) = LabelReport::from_run(&run) else {
        ui::error("run finished without a report");
        return Ok(ExitCode::FAILURE);
    };

    if cli.show_intermediate {
        ui::markdown(&report.with_intermediate());
    } else {
        ui::markdown(&report.report);
    }
    if !run.raw_stages().is_empty() {
        ui::warn(format!(
            "unstructured output forwarded from: {}",
            run.raw_stages().join(", ")
        ));
    }

    let saved = render::export_label(&out_dir(cli, config), &report)?;
    if !cli.quiet {
        ui::saved(&saved);
    }
    Ok(ExitCode::SUCCESS)
}

fn requirements_text(source: &RequirementsSource) -> Result<String> {
    match source {
        RequirementsSource::Text(text) => Ok(text.trim().to_string()),
        RequirementsSource::File(path) => Ok(std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?
            .trim()
            .to_string()),
        RequirementsSource::Template(name) => match evals::templates::find(name) {
            Some(template) => Ok(template.requirements.to_string()),
            None => bail!("unknown template '{name}' (see `relayrs templates`)"),
        },
    }
}

async fn run_evals(
    cli: &CliArgs,
    config: &AppConfig,
    source: &RequirementsSource,
) -> Result<ExitCode> {
    let requirements = requirements_text(source)?;
    if requirements.is_empty() {
        ui::warn("Please enter chatbot requirements before generating.");
        return Ok(ExitCode::FAILURE);
    }

    let options = EvalsOptions {
        planning_model: cli.planning_model.clone(),
        framework_model: cli.knowledge_model.clone(),
    };
    let prepared = match bootstrap::evals_pipeline(config, &options).await {
        Ok(prepared) => prepared,
        Err(e) => {
            ui::error(e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };
    if !cli.quiet {
        ui::header(
            evals::PIPELINE,
            &[
                ("planning", prepared.models.planning.as_str()),
                ("framework", prepared.models.framework.as_str()),
            ],
        );
    }

    let input = prepared.models.apply(PipelineInput::text(requirements));
    let Some(run) = execute(cli, config, evals::PIPELINE, &input, &prepared.stages).await? else {
        return Ok(ExitCode::FAILURE);
    };
    let Some(result) = EvalsResult::from_run(&run) else {
        ui::error("run finished without a framework");
        return Ok(ExitCode::FAILURE);
    };

    ui::section_title("Evaluation Framework");
    ui::markdown(&result.framework);
    if !cli.quiet {
        ui::section_title("Evaluation Plan");
        ui::markdown(&result.plan);
    }

    let saved = render::export_evals(&out_dir(cli, config), &result)?;
    if !cli.quiet {
        ui::saved(&saved);
    }
    Ok(ExitCode::SUCCESS)
}
