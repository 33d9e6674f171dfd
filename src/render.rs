//! Markdown → HTML conversion and the downloadable report files.

use anyhow::Context;
use pulldown_cmark::{Options, Parser, html};
use std::fs;
use std::path::{Path, PathBuf};

use crate::evals::EvalsResult;
use crate::label::LabelReport;

pub const FRAMEWORK_MD: &str = "chatbot_evaluation_framework.md";
pub const FRAMEWORK_HTML: &str = "chatbot_evaluation_framework.html";
pub const PLAN_MD: &str = "chatbot_evaluation_plan.md";
pub const LABEL_MD: &str = "product_health_report.md";
pub const LABEL_HTML: &str = "product_health_report.html";

/// HTML fragment for a Markdown document (tables and strikethrough enabled).
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Standalone HTML page around a converted Markdown body.
pub fn html_document(title: &str, markdown: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        markdown_to_html(markdown)
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn write(dir: &Path, name: &str, contents: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Framework as Markdown and HTML, plan as Markdown.
pub fn export_evals(dir: &Path, result: &EvalsResult) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(vec![
        write(dir, FRAMEWORK_MD, &result.framework)?,
        write(
            dir,
            FRAMEWORK_HTML,
            &html_document("Chatbot Evaluation Framework", &result.framework),
        )?,
        write(dir, PLAN_MD, &result.plan)?,
    ])
}

pub fn export_label(dir: &Path, report: &LabelReport) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(vec![
        write(dir, LABEL_MD, &report.report)?,
        write(
            dir,
            LABEL_HTML,
            &html_document("Product Health Assessment", &report.report),
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_lists_render() {
        let html = markdown_to_html("# Goldens\n\n- one\n- two\n\n**bold**");
        assert!(html.contains("<h1>Goldens</h1>"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn tables_render() {
        let html = markdown_to_html("| Metric | Target |\n|---|---|\n| Accuracy | 95% |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>Accuracy</td>"));
    }

    #[test]
    fn export_evals_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = EvalsResult {
            plan: "## Plan".into(),
            framework: "## Goldens\n\n1. Hi".into(),
        };
        let paths = export_evals(dir.path(), &result).unwrap();
        assert_eq!(paths.len(), 3);
        let html = fs::read_to_string(dir.path().join(FRAMEWORK_HTML)).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h2>Goldens</h2>"));
        assert_eq!(
            fs::read_to_string(dir.path().join(PLAN_MD)).unwrap(),
            "## Plan"
        );
    }
}
