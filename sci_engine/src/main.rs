use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::warn;
use serde::Serialize;

use sci_engine::kernel::EntryStatus;
use sci_engine::names::NameTables;
use sci_engine::trace::{run_trace, CallTrace, TraceOutcome, TraceReport};
use sci_engine::{EngineState, KernelDispatcher, KERNEL_MAP};

mod cli;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::parse()?;
    let config = &args.config;

    let dispatch_config = config.dispatch_config()?;
    let names = NameTables::load(config.resource_dir.as_deref(), config.version)
        .with_context(|| format!("loading name tables for {}", config.version))?;
    let mut dispatcher: KernelDispatcher<EngineState> =
        KernelDispatcher::new(names, KERNEL_MAP, dispatch_config)
            .context("building kernel table")?;
    for pattern in &config.log_kernels {
        if dispatcher.set_debug_logging(pattern, true) == 0 {
            warn!("--log-kernel {pattern}: no kernel function matches");
        }
    }

    if let Some(path) = args.kernel_json.as_deref() {
        write_json(path, &dispatcher.table().manifest())?;
        println!("Saved kernel manifest to {}", path.display());
    }
    if let Some(path) = args.selectors_json.as_deref() {
        write_json(path, dispatcher.names())?;
        println!("Saved name tables to {}", path.display());
    }

    describe_table(&dispatcher, args.verbose);

    if let Some(path) = args.run_trace.as_deref() {
        let trace = CallTrace::from_json_file(path)?;
        let report = run_trace(&dispatcher, &trace, config)
            .with_context(|| format!("replaying {}", path.display()))?;
        describe_report(&report);
        if let Some(path) = args.report_json.as_deref() {
            write_json(path, &report)?;
            println!("Saved trace report to {}", path.display());
        }
    }

    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("writing JSON to {}", path.display()))
}

fn describe_table(dispatcher: &KernelDispatcher<EngineState>, verbose: bool) {
    let names = dispatcher.names();
    let manifest = dispatcher.table().manifest();
    let implemented = manifest
        .functions
        .iter()
        .filter(|function| function.status != EntryStatus::Unimplemented)
        .count();

    println!("Interpreter: {} ({})", names.version, names.version.label());
    println!(
        "Kernel functions: {} ({} implemented) | selectors: {}",
        manifest.functions.len(),
        implemented,
        names.selector_names.len()
    );
    let missing = names.selectors.missing();
    if !missing.is_empty() {
        println!(
            "Selector cache: {}/{} resolved (missing {})",
            names.selectors.resolved(),
            names.selectors.len(),
            missing.join(", ")
        );
    }

    if !verbose {
        return;
    }
    println!();
    for function in &manifest.functions {
        println!(
            "  0x{number:02x} {name:<20} {status:<14} {signature}",
            number = function.number,
            name = function.name,
            status = format!("{:?}", function.status),
            signature = function.signature.as_deref().unwrap_or("-"),
        );
        for sub in &function.sub_functions {
            println!(
                "       {id:>2} {name:<26} {signature}",
                id = sub.id,
                name = sub.name,
                signature = sub.signature.as_deref().unwrap_or("-"),
            );
        }
    }
}

fn describe_report(report: &TraceReport) {
    println!("\nTrace ({} calls, {} errors):", report.calls.len(), report.errors);
    for call in &report.calls {
        let outcome = match &call.outcome {
            TraceOutcome::Value { value } => format!("= {value}"),
            TraceOutcome::Error { message } => format!("!! {message}"),
            other => format!("{other:?}").to_lowercase(),
        };
        println!(
            "  {index:>3}. k{kernel}({args}) {outcome} | acc {acc}",
            index = call.index,
            kernel = call.kernel,
            args = call.args.join(", "),
            acc = call.accumulator
        );
    }
    if report.quit {
        println!("Quit requested; trace stopped early.");
    }
}
