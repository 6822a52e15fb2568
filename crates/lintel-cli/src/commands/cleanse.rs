//! Parameter prefix cleansing command

use anyhow::{bail, Context, Result};
use lintel_engine::{Engine, EngineConfig};
use lintel_model::{compute_model_diff, load_model, save_model, save_model_string, Model};
use lintel_rules::{ActionDef, ActionKind, CheckKind, LooseBinding, RuleDef, Severity};

const RULE: &str = "no_prefixed_parameters";
const ACTION: &str = "strip_prefixed_parameters";

pub struct CleanseArgs {
    pub model: String,
    pub prefix: String,
    pub fix: bool,
    pub output_diff: bool,
}

/// Configuration that removes every parameter whose name starts with
/// `prefix` from every reachable element
fn cleanse_config(prefix: &str) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.rule.push(RuleDef::check(
        RULE,
        Severity::Warning,
        CheckKind::NoPrefixedParameters {
            prefix: prefix.to_string(),
        },
    ));
    config.action.push(ActionDef::new(
        ACTION,
        ActionKind::StripPrefixedParameters {
            prefix: prefix.to_string(),
        },
    ));
    config.binding.map.push(LooseBinding::new(RULE, &[ACTION]));
    config
}

pub fn run(args: CleanseArgs) -> Result<()> {
    if args.prefix.is_empty() {
        bail!("No prefix has been set.");
    }

    let engine = Engine::new(&cleanse_config(&args.prefix))?;
    let mut model = load_model(&args.model)
        .with_context(|| format!("failed to load model {}", args.model))?;
    let roots = model.roots();
    let before = save_model_string(&model)?;

    let report = if args.fix {
        engine.run(&mut model.graph, &roots)?
    } else {
        let (report, graph) = engine.preview(&model.graph, &roots)?;
        model = Model {
            meta: model.meta,
            graph,
        };
        report
    };

    let summaries = report.action_summaries();
    let removed = summaries
        .iter()
        .find(|s| s.action == ACTION)
        .map(|s| s.changed.len())
        .unwrap_or(0);

    if removed == 0 {
        println!("No parameters with prefix '{}' found.", args.prefix);
        return Ok(());
    }

    for record in report.records() {
        for result in record.changes() {
            let names = result
                .before
                .as_ref()
                .and_then(|v| v.as_table())
                .map(|t| t.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            println!("  {} ({}): removed {}", record.key, record.element_type, names);
        }
    }
    println!(
        "\n{} element(s) cleansed of parameters with prefix '{}'",
        removed, args.prefix
    );

    if args.output_diff {
        let after = save_model_string(&model)?;
        println!("\nDiff:");
        print!("{}", compute_model_diff(&before, &after));
    }

    if args.fix {
        save_model(&args.model, &model)?;
        println!("\nModel saved to {}", args.model);
    } else {
        println!("\nRun with --fix to save the cleansed model.");
    }

    Ok(())
}
