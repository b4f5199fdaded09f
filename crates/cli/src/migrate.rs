//! CLI migration subcommands: migrate, plan, list and version.
//!
//! Commands resolve settings, load the migration directory and the
//! configuration file, and hand the work to the core engine. Reading and
//! writing files happens here, never inside the engine.

use std::path::{Path, PathBuf};
use std::process;

use configmigration_core::{
    Document, DocumentFormat, MigrationEngine, MigrationRegistry, MigrationReport, PlannedStep,
    StepStatus,
};
use serde_json::json;

use crate::settings::{Resolved, Settings};
use crate::{report_error, DocFormat, OutputFormat, RunArgs};

/// Where `migrate` puts the migrated document.
pub enum Destination {
    Stdout,
    File(PathBuf),
    /// `--dry-run`: only the report is printed.
    Discard,
}

/// Migrate a configuration file and emit the result.
///
/// Exits 1 on settings, load, parse or planning errors and 2 when a step
/// fails. A failed run still emits the document as of the last committed
/// step; a file destination is only written when at least one step was
/// committed.
pub fn cmd_migrate(
    config: &Path,
    settings: &Settings,
    run: &RunArgs,
    format: Option<DocFormat>,
    destination: Destination,
    output: OutputFormat,
    quiet: bool,
) {
    let resolved = resolve(settings, run, output, quiet);
    let registry = load_registry(&resolved, output, quiet);
    let document = read_document(config, resolved.format, output, quiet);

    let engine = build_engine(&registry, &resolved, output, quiet);
    let outcome = match engine.run(document) {
        Ok(o) => o,
        Err(e) => {
            report_error(&format!("migration error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let target_format = format
        .map(DocumentFormat::from)
        .or(resolved.format)
        .unwrap_or_else(|| outcome.document().format());
    let (document, report) = outcome.into_parts();
    let failed = !report.is_success();
    if failed {
        tracing::warn!(
            version = %committed_version(&report),
            "migration failed; emitting the last committed document"
        );
    }

    let rendered = match document.serialize_as(target_format) {
        Ok(text) => with_trailing_newline(text),
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match destination {
        Destination::Stdout => match output {
            OutputFormat::Json => println!(
                "{}",
                pretty(&json!({ "report": report.to_json(), "document": document.value() }))
            ),
            OutputFormat::Text => {
                print!("{}", rendered);
                if !quiet {
                    eprint!("{}", report.render_text());
                }
            }
        },
        Destination::File(path) => {
            let progressed = report.applied_count() + report.skipped_count() > 0;
            let written = !failed || progressed;
            if written {
                if let Err(e) = std::fs::write(&path, &rendered) {
                    report_error(
                        &format!("could not write '{}': {}", path.display(), e),
                        output,
                        quiet,
                    );
                    process::exit(1);
                }
            }
            match output {
                OutputFormat::Json => {
                    let mut body = json!({ "report": report.to_json(), "document": document.value() });
                    if written {
                        body["written"] = json!(path.display().to_string());
                    }
                    println!("{}", pretty(&body));
                }
                OutputFormat::Text => {
                    if !quiet {
                        if failed {
                            eprint!("{}", report.render_text());
                        } else {
                            print!("{}", report.render_text());
                        }
                        if written {
                            println!("wrote {}", path.display());
                        }
                    }
                }
            }
        }
        Destination::Discard => {
            if failed && output == OutputFormat::Text {
                if !quiet {
                    eprint!("{}", report.render_text());
                }
            } else {
                print_report(&report, output, quiet);
            }
        }
    }

    if failed {
        process::exit(2);
    }
}

/// Show the steps a migration would apply.
pub fn cmd_plan(
    config: &Path,
    settings: &Settings,
    run: &RunArgs,
    output: OutputFormat,
    quiet: bool,
) {
    let resolved = resolve(settings, run, output, quiet);
    let registry = load_registry(&resolved, output, quiet);
    let document = read_document(config, resolved.format, output, quiet);

    let engine = build_engine(&registry, &resolved, output, quiet);
    let plan = match engine.plan(&document) {
        Ok(p) => p,
        Err(e) => {
            report_error(&format!("planning error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => println!(
            "{}",
            pretty(&json!({
                "current": plan.current(),
                "target": plan.target(),
                "steps": plan.summary(),
            }))
        ),
        OutputFormat::Text => {
            if plan.is_empty() {
                println!("already at version {}", plan.target());
                return;
            }
            println!(
                "{} step(s) from {} to {}:",
                plan.len(),
                plan.current(),
                plan.target()
            );
            print_steps(&plan.summary());
        }
    }
}

/// List every loaded migration.
pub fn cmd_list(settings: &Settings, run: &RunArgs, output: OutputFormat, quiet: bool) {
    let resolved = resolve(settings, run, output, quiet);
    let registry = load_registry(&resolved, output, quiet);
    let steps: Vec<PlannedStep> = registry
        .steps()
        .map(|s| PlannedStep {
            step: s.id(),
            from: s.from_version().clone(),
            to: s.to_version().clone(),
            description: s.description().to_string(),
        })
        .collect();

    match output {
        OutputFormat::Json => println!("{}", pretty(&json!(steps))),
        OutputFormat::Text => {
            if steps.is_empty() {
                if !quiet {
                    println!("no migrations in {}", resolved.migrations.display());
                }
                return;
            }
            print_steps(&steps);
        }
    }
}

/// Print the version a configuration file is at.
pub fn cmd_version(
    config: &Path,
    settings: &Settings,
    run: &RunArgs,
    output: OutputFormat,
    quiet: bool,
) {
    let resolved = resolve(settings, run, output, quiet);
    let document = read_document(config, resolved.format, output, quiet);

    let registry = MigrationRegistry::default();
    let engine = build_engine(&registry, &resolved, output, quiet);
    match engine.current_version(&document) {
        Ok(version) => match output {
            OutputFormat::Json => println!("{}", json!({ "version": version })),
            OutputFormat::Text => println!("{}", version),
        },
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn resolve(settings: &Settings, run: &RunArgs, output: OutputFormat, quiet: bool) -> Resolved {
    match settings.resolve(run) {
        Ok(r) => r,
        Err(e) => {
            report_error(&e, output, quiet);
            process::exit(1);
        }
    }
}

fn load_registry(resolved: &Resolved, output: OutputFormat, quiet: bool) -> MigrationRegistry {
    match MigrationRegistry::from_source(&resolved.source()) {
        Ok(registry) => {
            tracing::debug!(
                dir = %resolved.migrations.display(),
                migrations = registry.len(),
                "loaded migrations"
            );
            registry
        }
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn build_engine<'r>(
    registry: &'r MigrationRegistry,
    resolved: &Resolved,
    output: OutputFormat,
    quiet: bool,
) -> MigrationEngine<'r> {
    match MigrationEngine::new(registry, resolved.engine.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

/// Version of the document a failed run hands back.
fn committed_version(report: &MigrationReport) -> String {
    report
        .records()
        .iter()
        .rev()
        .find(|r| r.status != StepStatus::Failed)
        .map(|r| r.to.to_string())
        .unwrap_or_else(|| report.from().to_string())
}

/// Read a configuration file. The extension decides the format; `fallback`
/// covers files without a recognised one.
fn read_document(
    path: &Path,
    fallback: Option<DocumentFormat>,
    output: OutputFormat,
    quiet: bool,
) -> Document {
    let format = DocumentFormat::from_path(path)
        .or(fallback)
        .unwrap_or_default();
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            report_error(
                &format!("could not read '{}': {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    match Document::parse(&text, format) {
        Ok(doc) => doc,
        Err(e) => {
            report_error(&format!("{}: {}", path.display(), e), output, quiet);
            process::exit(1);
        }
    }
}

fn print_report(report: &MigrationReport, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => println!("{}", pretty(&json!({ "report": report.to_json() }))),
        OutputFormat::Text => {
            if !quiet {
                print!("{}", report.render_text());
            }
        }
    }
}

fn print_steps(steps: &[PlannedStep]) {
    let width = steps.iter().map(|s| s.step.len()).max().unwrap_or(0);
    for s in steps {
        if s.description.is_empty() {
            println!("  {}", s.step);
        } else {
            println!("  {:<width$}  {}", s.step, s.description, width = width);
        }
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e))
}

fn with_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
