//! OpGraph CLI - inspect the operator catalogue
//!
//! This is a demonstration CLI for the OpGraph library.

use anyhow::{bail, Context, Result};
use log::info;
use opgraph::operators::color_space;
use opgraph::prelude::*;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("opgraph");

    let Some(command) = args.get(1) else {
        print_usage(program);
        return Ok(());
    };

    match command.as_str() {
        "list" => list_operators(),
        "info" => match args.get(2) {
            Some(name) => operator_info(name),
            None => bail!("please specify an operator name"),
        },
        "describe" => describe_demo(args.get(2).map(Path::new)),
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            print_usage(program);
            bail!("unknown command: {}", other)
        }
    }
}

fn print_usage(program: &str) {
    println!("OpGraph v{}", opgraph::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                 List all registered operators");
    println!("  info <operator>      Print an operator description as JSON");
    println!("  describe [config]    Build a demo graph and print it as JSON");
    println!("  help                 Show this help message");
}

fn list_operators() -> Result<()> {
    let registry = OperationRegistry::with_builtins()?;
    let descriptors = registry.descriptors();

    println!("Available operators ({} total):", descriptors.len());
    println!();
    for descriptor in descriptors {
        let modes = registry.modes_for(descriptor.name());
        println!("  {:<16} [{}] {}", descriptor.name(), modes, descriptor.description());
    }
    Ok(())
}

fn operator_info(name: &str) -> Result<()> {
    let registry = OperationRegistry::with_builtins()?;
    let descriptor = registry
        .descriptors()
        .into_iter()
        .find(|d| d.name().eq_ignore_ascii_case(name))
        .with_context(|| format!("no operator named '{}'", name))?;

    println!("{}", serde_json::to_string_pretty(&descriptor.summary())?);
    Ok(())
}

/// Pattern -> ColorConvert -> Binarize, printed without rendering.
fn describe_demo(config: Option<&Path>) -> Result<()> {
    let options = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EngineOptions::from_toml_str(&text)?
        }
        None => EngineOptions::default(),
    };
    info!("engine options: {:?}", options);

    let engine = Engine::with_builtins()?.with_options(options);

    let pattern = engine.create_grid(
        "Pattern",
        ParameterBlock::new()
            .with_parameter("width", 64i64)
            .with_parameter("height", 48i64)
            .with_parameter("bands", 3i64),
    )?;
    let gray = engine.create_grid(
        "ColorConvert",
        ParameterBlock::new()
            .with_source(pattern)
            .with_parameter("colorSpace", color_space("GRAY").context("missing GRAY color space")?),
    )?;
    let binary = engine.create_grid(
        "Binarize",
        ParameterBlock::new()
            .with_source(gray)
            .with_parameter("threshold", 0.5),
    )?;

    println!("{}", GraphDescription::of(&binary).to_json()?);
    Ok(())
}
