use crate::cmd::{block_on, open_cell, parse_params};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use pna_core::macro_file;
use pna_core::types::{DeviceClass, ParameterSet};
use std::path::Path;

#[derive(Subcommand)]
pub enum MacroSubcommand {
    /// List saved macros
    List,
    /// Print a macro's steps
    Show { name: String },
    /// Append a macro's steps to the job queue
    Import { name: String },
    /// Dispatch a macro's steps directly, stopping at the first failure
    Replay { name: String },
    /// Dispatch a sequence of steps while recording them into a macro
    Record {
        name: String,
        /// One step, e.g. --step "rig.goto x=10 y=5" (repeatable, run in order)
        #[arg(long = "step", required = true)]
        steps: Vec<String>,
    },
}

pub fn run(
    root: &Path,
    simulate: bool,
    subcmd: MacroSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let cell = open_cell(root, simulate)?;
    match subcmd {
        MacroSubcommand::List => {
            let names = macro_file::list(&cell.macros_dir())?;
            if json {
                return print_json(&names);
            }
            if names.is_empty() {
                println!("No macros.");
            }
            for name in names {
                println!("{name}");
            }
            Ok(())
        }
        MacroSubcommand::Show { name } => {
            let records = macro_file::load(&cell.macro_path(&name))?;
            if json {
                return print_json(&records);
            }
            let rows = records
                .iter()
                .map(|r| {
                    vec![
                        r.sequence_id.to_string(),
                        format!("{}.{}", r.device_class, r.operation),
                        r.params.summary(),
                    ]
                })
                .collect();
            print_table(&["#", "OPERATION", "PARAMS"], rows);
            Ok(())
        }
        MacroSubcommand::Import { name } => {
            let path = cell.macro_path(&name);
            let records = macro_file::load(&path)?;
            let jobs = cell.runner.db().import(&records)?;
            if json {
                return print_json(&serde_json::json!({ "imported": jobs.len(), "jobs": jobs }));
            }
            match (jobs.first(), jobs.last()) {
                (Some(first), Some(last)) => println!(
                    "Imported {} job(s) from {} (ids {}..={})",
                    jobs.len(),
                    path.display(),
                    first.id,
                    last.id
                ),
                _ => println!("{} has no steps", path.display()),
            }
            Ok(())
        }
        MacroSubcommand::Replay { name } => {
            let records = macro_file::load(&cell.macro_path(&name))?;
            let report = block_on(cell.dispatcher.replay(&records))?;
            if json {
                print_json(&report)?;
            } else {
                println!("Replayed {}/{} step(s)", report.completed, report.total);
            }
            match report.failed_at {
                Some((seq, msg)) => anyhow::bail!("step {seq} failed: {msg}"),
                None => Ok(()),
            }
        }
        MacroSubcommand::Record { name, steps } => {
            let steps = steps
                .iter()
                .map(|s| parse_step(s))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let path = cell.macro_path(&name);
            let recorder = cell.dispatcher.recorder();
            recorder.start(&path)?;

            let dispatcher = cell.dispatcher.clone();
            let failures = block_on(async move {
                let mut failures = Vec::new();
                for (device, op, params) in &steps {
                    if let Err(e) = dispatcher.dispatch(*device, op, params).await {
                        failures.push(format!("{device}.{op}: {e}"));
                    }
                }
                failures
            })?;

            let outcome = recorder.stop();
            if json {
                print_json(&outcome)?;
            } else {
                for f in &failures {
                    eprintln!("warning: {f}");
                }
                if let Some(dest) = &outcome.saved_to {
                    println!("Recorded {} step(s) to {}", outcome.records.len(), dest.display());
                }
            }
            if let Some(e) = outcome.write_error {
                anyhow::bail!("macro not saved: {e}");
            }
            Ok(())
        }
    }
}

/// `device.operation k=v ...`
fn parse_step(raw: &str) -> anyhow::Result<(DeviceClass, String, ParameterSet)> {
    let mut words = raw.split_whitespace();
    let head = words.next().context("empty step")?;
    let (device, op) = head
        .split_once('.')
        .with_context(|| format!("step '{raw}' must start with device.operation"))?;
    let params: Vec<String> = words.map(str::to_string).collect();
    Ok((device.parse()?, op.to_string(), parse_params(&params)?))
}
