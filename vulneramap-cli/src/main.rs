mod cli;

use std::process;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;

use cli::Cli;
use vulneramap::{JobInput, JobResultData, JobSnapshot, JobStatus, Orchestrator, Severity};

fn init_tracing(args: &Cli) {
    let fmt = tracing_subscriber::fmt()
        .with_max_level(args.verbosity.tracing_level_filter())
        .with_writer(std::io::stderr)
        .with_target(false);
    if args.json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(&args);

    if !args.file.exists() {
        eprintln!("error: file not found: {}", args.file.display());
        process::exit(1);
    }

    match run(&args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

async fn run(args: &Cli) -> anyhow::Result<i32> {
    let fail_on = args.fail_on.as_deref().map(parse_fail_on).transpose()?;

    let orch = Arc::new(Orchestrator::with_defaults());
    let job_id = orch.create_job().await;
    let (_, mut feed) = orch
        .subscribe(&job_id)
        .await
        .context("job vanished before analysis started")?;
    orch.spawn_analysis(job_id.clone(), JobInput::new(&args.file));

    let last = watch(&mut feed).await?;
    if last.status == JobStatus::Failed {
        bail!(
            "analysis failed: {}",
            last.error.as_deref().unwrap_or("unknown error")
        );
    }
    let data = last.data.context("completed job carried no result")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        render_text(&data);
    }

    Ok(exit_code(&data, fail_on))
}

/// Follow the job feed until a terminal snapshot arrives.
async fn watch(feed: &mut broadcast::Receiver<JobSnapshot>) -> anyhow::Result<JobSnapshot> {
    loop {
        match feed.recv().await {
            Ok(snap) => {
                info!(progress = snap.progress, status = ?snap.status, "analysis progress");
                if snap.status.is_terminal() {
                    return Ok(snap);
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                bail!("job feed closed before completion")
            }
        }
    }
}

fn parse_fail_on(raw: &str) -> anyhow::Result<Severity> {
    let severity: Severity = raw.parse()?;
    if severity.rank() == 0 {
        bail!("invalid --fail-on threshold: {raw} (valid: low, medium, high, critical)");
    }
    Ok(severity)
}

fn render_text(data: &JobResultData) {
    println!("{}", data.summary);
    println!();
    if data.components.is_empty() {
        println!("no vulnerable components found");
    }
    for comp in &data.components {
        let version = comp.version.as_deref().unwrap_or("unknown");
        println!(
            "{}@{}  score: {:.1}  severity: {}",
            comp.name, version, comp.final_risk_score, comp.risk_severity
        );
        for vuln in &comp.vulnerabilities {
            println!("  {} ({} / cvss {:.1})", vuln.id, vuln.severity, vuln.cvss);
        }
        for reason in &comp.risk_reasons {
            println!("  - {reason}");
        }
    }
    println!();
    println!(
        "components: {} total, {} vulnerable",
        data.stats.total_components, data.stats.vulnerable_components
    );
}

fn exit_code(data: &JobResultData, fail_on: Option<Severity>) -> i32 {
    let Some(threshold) = fail_on else { return 0 };
    let breached = data
        .components
        .iter()
        .filter(|c| c.risk_severity.rank() >= threshold.rank())
        .count();
    if breached > 0 {
        info!(breached, threshold = %threshold, "fail-on threshold reached");
        1
    } else {
        0
    }
}
