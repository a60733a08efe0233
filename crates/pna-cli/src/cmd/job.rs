use crate::cmd::{block_on, open_cell, parse_params};
use crate::output::{print_json, print_table};
use clap::Subcommand;
use pna_core::queue::{Job, JobUpdate};
use pna_core::types::{DeviceClass, JobStatus};
use pna_server::AppState;
use std::path::Path;

#[derive(Subcommand)]
pub enum JobSubcommand {
    /// Append a job (blank unless a device and operation are given)
    Add {
        device: Option<String>,
        operation: Option<String>,
        /// Parameters as key=value; omitted ones come from the template
        params: Vec<String>,
    },
    /// List jobs in queue order
    List {
        /// Case-insensitive match on id, device, operation or status
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one job
    Get { id: u64 },
    /// Edit a job's fields
    Update {
        id: u64,
        #[arg(long)]
        device: Option<String>,
        #[arg(long = "op")]
        operation: Option<String>,
        /// Replace all params (repeatable key=value)
        #[arg(long = "param")]
        params: Vec<String>,
        /// New status, e.g. "todo" or "failed"
        #[arg(long)]
        status: Option<String>,
    },
    /// Remove a job
    Delete { id: u64 },
    /// Run one job now, whatever its status
    Run { id: u64 },
}

pub fn run(root: &Path, simulate: bool, subcmd: JobSubcommand, json: bool) -> anyhow::Result<()> {
    let cell = open_cell(root, simulate)?;
    match subcmd {
        JobSubcommand::Add {
            device,
            operation,
            params,
        } => add(&cell, device.as_deref(), operation, &params, json),
        JobSubcommand::List {
            filter,
            offset,
            limit,
        } => list(&cell, filter.as_deref(), offset, limit, json),
        JobSubcommand::Get { id } => show(&cell.runner.db().get(id)?, json),
        JobSubcommand::Update {
            id,
            device,
            operation,
            params,
            status,
        } => {
            let update = JobUpdate {
                device_class: device.as_deref().map(str::parse).transpose()?,
                operation,
                params: if params.is_empty() {
                    None
                } else {
                    Some(parse_params(&params)?)
                },
                status: status.as_deref().map(str::parse).transpose()?,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update; pass --device, --op, --param or --status");
            }
            apply(&cell, id, update, json)
        }
        JobSubcommand::Delete { id } => {
            cell.runner.db().delete(id)?;
            if json {
                print_json(&serde_json::json!({ "deleted": id }))
            } else {
                println!("Deleted job {id}");
                Ok(())
            }
        }
        JobSubcommand::Run { id } => {
            let job = block_on(cell.runner.run_one(id))??;
            show(&job, json)
        }
    }
}

fn add(
    cell: &AppState,
    device: Option<&str>,
    operation: Option<String>,
    params: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let job = cell.runner.db().create()?;
    let job = match (device, operation) {
        (None, None) => job,
        (Some(device), Some(operation)) => {
            let device: DeviceClass = device.parse()?;
            cell.dispatcher.registry().lookup(device, &operation)?;
            let update = JobUpdate {
                device_class: Some(device),
                operation: Some(operation),
                ..Default::default()
            };
            let mut job = job;
            update.apply_with_template(&mut job, cell.dispatcher.registry());
            job.params = parse_params(params)?.merged_over(&job.params);
            cell.runner.db().update(&job)?
        }
        _ => anyhow::bail!("give both a device and an operation, or neither"),
    };

    if json {
        return print_json(&job);
    }
    println!("Added job {}: {}", job.id, job.label());
    Ok(())
}

fn list(
    cell: &AppState,
    filter: Option<&str>,
    offset: usize,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let page = cell.runner.db().list(filter, offset, limit)?;
    if json {
        return print_json(&page);
    }
    if page.jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }
    let rows = page.jobs.iter().map(row).collect();
    print_table(&["ID", "STATUS", "OPERATION", "PARAMS", "ERROR"], rows);
    if page.jobs.len() < page.total {
        println!("({} of {} shown)", page.jobs.len(), page.total);
    }
    Ok(())
}

fn apply(cell: &AppState, id: u64, update: JobUpdate, json: bool) -> anyhow::Result<()> {
    let db = cell.runner.db();
    let mut job = db.get(id)?;
    update.apply_with_template(&mut job, cell.dispatcher.registry());
    let job = db.update(&job)?;
    show(&job, json)
}

fn show(job: &Job, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(job);
    }
    println!("Job {}: {}", job.id, job.label());
    println!("  status:  {}", job.status);
    if !job.params.is_empty() {
        println!("  params:  {}", job.params.summary());
    }
    if job.status == JobStatus::Failed {
        println!("  error:   {}", job.error.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn row(job: &Job) -> Vec<String> {
    vec![
        job.id.to_string(),
        job.status.to_string(),
        job.label(),
        job.params.summary(),
        job.error.clone().unwrap_or_default(),
    ]
}
