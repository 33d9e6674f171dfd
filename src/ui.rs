use colored::*;
use std::path::Path;

use crate::pipeline::{ProgressUpdate, RunEntry, StageResult};
use crate::sanitize;

/// Environment variable that enables machine-readable JSON logs when set to "1" or "true".
const MACHINE_LOG_ENV: &str = "RELAYRS_MACHINE_LOG";

pub fn init_logging() {
    // Internal logs are opt-in via RUST_LOG; console output below is separate.
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Warn);
    }
    let _ = builder.try_init();
}

fn machine_log_enabled() -> bool {
    matches!(
        std::env::var(MACHINE_LOG_ENV)
            .ok()
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("1") | Some("true")
    )
}

fn emit_machine_event(kind: &str, data: serde_json::Value) {
    if !machine_log_enabled() {
        return;
    }
    let event = serde_json::json!({
        "kind": kind,
        "data": data,
    });
    if let Ok(line) = serde_json::to_string(&event) {
        eprintln!("{line}");
    }
}

pub fn info(msg: impl AsRef<str>) {
    let raw = msg.as_ref();
    println!("{}", sanitize::sanitize_preview_for_console(raw));
    emit_machine_event("info", serde_json::json!({ "message": raw }));
}

pub fn warn(msg: impl AsRef<str>) {
    let raw = msg.as_ref();
    eprintln!("{}", sanitize::sanitize_preview_for_console(raw).yellow());
    emit_machine_event("warn", serde_json::json!({ "message": raw }));
}

pub fn error(msg: impl AsRef<str>) {
    let raw = msg.as_ref();
    eprintln!("{} {}", "✗".red().bold(), sanitize::sanitize_preview_for_console(raw).red());
    emit_machine_event("error", serde_json::json!({ "message": raw }));
}

pub fn header(pipeline: &str, models: &[(&str, &str)]) {
    let summary = models
        .iter()
        .map(|(stage, model)| format!("{stage}={}", sanitize::sanitize_preview_for_console(model)))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "{} {} | {} | {}",
        ">>".bold(),
        "relayrs".bold(),
        pipeline.cyan(),
        summary.dimmed()
    );
    let models: Vec<_> = models
        .iter()
        .map(|(s, m)| serde_json::json!({"stage": s, "model": m}))
        .collect();
    emit_machine_event(
        "header",
        serde_json::json!({ "pipeline": pipeline, "models": models }),
    );
}

/// One progress notification, rendered as a percentage line.
pub fn progress(update: &ProgressUpdate) {
    let pct = format!("{:>3.0}%", update.fraction * 100.0);
    let message = sanitize::sanitize_preview_for_console(&update.message);
    println!("{} {}", pct.purple().bold(), message.dimmed());
    emit_machine_event("progress", serde_json::json!(update));
}

/// Outcome line for a finished stage.
pub fn stage_entry(entry: &RunEntry) {
    let secs = entry.elapsed_ms as f64 / 1000.0;
    match &entry.result {
        StageResult::Structured(_) => println!(
            "  {} {} {}",
            "└─".green(),
            entry.stage.green(),
            format!("({secs:.1}s)").dimmed()
        ),
        StageResult::Raw(_) => println!(
            "  {} {} {}",
            "└─".yellow(),
            entry.stage.yellow(),
            format!("(raw output, {secs:.1}s)").dimmed()
        ),
        StageResult::Failed(reason) => println!(
            "  {} {} {}",
            "└─".red(),
            entry.stage.red(),
            sanitize::sanitize_preview_for_console(reason).red()
        ),
    }
    emit_machine_event("stage", serde_json::json!(entry));
}

pub fn section_title(title: &str) {
    let safe = sanitize::sanitize_preview_for_console(title);
    println!("\n{}", safe.bold());
}

/// Full Markdown document; never truncated.
pub fn markdown(text: &str) {
    println!("{}", sanitize::sanitize_for_console(text));
}

pub fn saved(paths: &[impl AsRef<Path>]) {
    for path in paths {
        println!("  {} {}", "saved".green(), path.as_ref().display().to_string().dimmed());
    }
    emit_machine_event(
        "saved",
        serde_json::json!(paths
            .iter()
            .map(|p| p.as_ref().display().to_string())
            .collect::<Vec<_>>()),
    );
}
