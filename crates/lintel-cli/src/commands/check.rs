//! Configuration check command

use anyhow::{Context, Result};
use lintel_engine::{Engine, EngineConfig};

pub fn run(config_path: &str) -> Result<()> {
    let config = EngineConfig::load_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path))?;
    let engine = Engine::new(&config)?;

    let rules = engine.rules();
    let composite = rules.rules().iter().filter(|r| r.is_composite()).count();
    let dispatcher = engine.dispatcher();

    println!("Configuration OK: {}", config_path);
    println!(
        "  traversal: {} rule(s){}",
        config.traversal.rule.len(),
        if engine.is_strict() { ", strict" } else { "" }
    );
    println!("  rules: {} ({} composite)", rules.len(), composite);
    for rule in rules.rules() {
        let marker = if rule.is_standalone() { "" } else { " [composite only]" };
        println!("    {} [{}]{}", rule.name(), rule.severity(), marker);
    }
    println!(
        "  actions: {} ({:?} binding, triggers at {} and above{})",
        dispatcher.actions().len(),
        dispatcher.mode(),
        dispatcher.min_severity(),
        if dispatcher.on_error() { " and on errors" } else { "" }
    );
    for action in dispatcher.actions() {
        match action.answers() {
            Some(answers) => println!(
                "    {} ({}) answers {}",
                action.name(),
                action.kind().strategy(),
                answers.rule
            ),
            None => println!("    {} ({})", action.name(), action.kind().strategy()),
        }
    }

    Ok(())
}
