//! Model validation command

use anyhow::{Context, Result};
use lintel_core::ElementKey;
use lintel_engine::{Engine, EngineConfig, Report};
use lintel_model::{compute_model_diff, load_model, save_model, save_model_string, Model};
use lintel_rules::Severity;

pub struct ValidateArgs {
    pub model: String,
    pub config: String,
    pub fix: bool,
    pub dry_run: bool,
    pub output_diff: bool,
    pub strict: bool,
    pub roots: Vec<String>,
    pub format: String,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let config = EngineConfig::load_file(&args.config)
        .with_context(|| format!("failed to load config {}", args.config))?;
    let mut engine = Engine::new(&config)?;
    if args.strict {
        engine = engine.with_strict(true);
    }

    let mut model = load_model(&args.model)
        .with_context(|| format!("failed to load model {}", args.model))?;
    let roots: Vec<ElementKey> = if args.roots.is_empty() {
        model.roots()
    } else {
        args.roots.iter().map(ElementKey::new).collect()
    };

    let before = if args.output_diff {
        Some(save_model_string(&model)?)
    } else {
        None
    };

    let (report, repaired) = if args.fix {
        let report = engine.run(&mut model.graph, &roots)?;
        (report, None)
    } else if args.dry_run {
        let (report, graph) = engine.preview(&model.graph, &roots)?;
        let preview = Model {
            meta: model.meta.clone(),
            graph,
        };
        (report, Some(preview))
    } else {
        (engine.validate(&model.graph, &roots)?, None)
    };

    if args.format == "json" {
        print_report_json(&report)?;
    } else {
        print_report_text(&report);
    }

    if args.fix && report.counts().changed > 0 {
        save_model(&args.model, &model)?;
        println!("\nModel saved to {}", args.model);
    }

    if let Some(before) = before {
        let after_model = repaired.as_ref().unwrap_or(&model);
        let after = save_model_string(after_model)?;
        if after != before {
            println!("\nDiff:");
            print!("{}", compute_model_diff(&before, &after));
        }
    }

    let ok = if args.fix || args.dry_run {
        report.is_resolved()
    } else {
        report.is_clean()
    };
    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "ERROR",
        Severity::Violation => "VIOL ",
        Severity::Warning => "WARN ",
        Severity::Info => "INFO ",
    }
}

fn show<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_report_text(report: &Report) {
    if report.is_dry_run() {
        println!("Dry run: the model file is not modified.");
    }
    println!("{}", report.summary());

    if report.counts().failed == 0
        && report.counts().changed == 0
        && report.counts().errored == 0
        && report.traversal_errors().is_empty()
    {
        println!("All rules passed.");
        return;
    }
    println!();

    for record in report.records() {
        for outcome in record.failures() {
            println!(
                "  [{}] {} ({}): {}",
                severity_label(outcome.severity),
                record.key,
                outcome.rule,
                outcome.message
            );
        }

        for result in &record.actions {
            let parameter = result.parameter.as_deref().unwrap_or("*");
            if let Some(err) = &result.error {
                println!("  [FAIL ] {} {}: {}", result.action, record.key, err);
            } else if result.changed {
                println!(
                    "  [FIX  ] {} {}.{}: {} -> {}",
                    result.action,
                    record.key,
                    parameter,
                    show(result.before.as_ref()),
                    show(result.after.as_ref())
                );
            }
        }

        if !record.skipped.is_empty() {
            println!(
                "  [SKIP ] {}: {}",
                record.key,
                record.skipped.join(", ")
            );
        }
    }

    for error in report.traversal_errors() {
        println!("  [TRAV ] {}", error);
    }

    let summaries = report.action_summaries();
    if !summaries.is_empty() {
        println!("\nActions:");
        for summary in summaries {
            println!(
                "  {}: {} applied, {} changed, {} failed",
                summary.action,
                summary.applied,
                summary.changed.len(),
                summary.errors
            );
        }
    }
}

fn print_report_json(report: &Report) -> Result<()> {
    let output = serde_json::json!({
        "clean": report.is_clean(),
        "resolved": report.is_resolved(),
        "summary": report.summary(),
        "actions": report.action_summaries(),
        "report": report,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
