use crate::cmd::{block_on, open_cell};
use crate::output::print_json;
use clap::Subcommand;
use pna_core::queue::{JobRunner, RunnerEvent};
use pna_core::types::{JobStatus, RunState};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

#[derive(Subcommand)]
pub enum QueueSubcommand {
    /// Run the next to-do job
    Step,
    /// Run every to-do job in order until the queue drains (Ctrl-C stops)
    Run,
    /// Put every job back to to-do
    Reset,
    /// Show completed/total
    Progress,
}

pub fn run(
    root: &Path,
    simulate: bool,
    subcmd: QueueSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let cell = open_cell(root, simulate)?;
    let runner = cell.runner;
    match subcmd {
        QueueSubcommand::Step => block_on(step(&runner, json))?,
        QueueSubcommand::Run => block_on(drain(&runner, json))?,
        QueueSubcommand::Reset => {
            let changed = block_on(runner.reset())??;
            if json {
                print_json(&serde_json::json!({ "reset": changed }))
            } else {
                println!("Reset {changed} job(s) to to_do");
                Ok(())
            }
        }
        QueueSubcommand::Progress => {
            let progress = block_on(runner.progress())??;
            if json {
                print_json(&serde_json::json!({
                    "completed": progress.completed,
                    "total": progress.total,
                    "ratio": progress.ratio(),
                }))
            } else {
                println!("{progress}");
                Ok(())
            }
        }
    }
}

async fn step(runner: &JobRunner, json: bool) -> anyhow::Result<()> {
    let job = runner.step().await?;
    let progress = runner.progress().await?;
    if json {
        return print_json(&serde_json::json!({ "job": job, "progress": progress }));
    }
    match job {
        Some(job) => match job.status {
            JobStatus::Failed => println!(
                "job {} {} failed: {} ({progress})",
                job.id,
                job.label(),
                job.error.as_deref().unwrap_or("-")
            ),
            _ => println!("job {} {} {} ({progress})", job.id, job.label(), job.status),
        },
        None => println!("Queue empty ({progress})"),
    }
    Ok(())
}

async fn drain(runner: &JobRunner, json: bool) -> anyhow::Result<()> {
    let mut events = runner.subscribe();
    if !runner.run() {
        anyhow::bail!("queue is already running");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                eprintln!("stopping after the current job...");
                runner.stop();
                runner.wait_until_stopped().await;
                break;
            }
            event = events.recv() => match event {
                Ok(RunnerEvent::StateChanged { state: RunState::Stopped }) => break,
                Ok(ev @ RunnerEvent::JobFinished { .. }) if json => {
                    println!("{}", serde_json::to_string(&ev)?);
                }
                Ok(RunnerEvent::JobFinished { id, status, error, progress }) => match error {
                    Some(e) => println!("job {id} {status}: {e} ({progress})"),
                    None => println!("job {id} {status} ({progress})"),
                },
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }

    let progress = runner.progress().await?;
    if !json {
        println!("Queue stopped at {progress}");
    }
    Ok(())
}
