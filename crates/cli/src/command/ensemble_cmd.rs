// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ntm ensemble` subcommands.
//!
//! `ensemble <preset> "<question>"` starts and drives a run; the named
//! subcommands manage existing runs.

use clap::{Args, Subcommand};
use serde_json::json;

use crate::ensemble::preset::{self, SynthesisStrategy};
use crate::ensemble::synthesize::OutputFormat;
use crate::error::{NtmError, Result};
use crate::runtime::Runtime;

use super::{parse_duration, CmdResult, Outcome};

#[derive(Debug, Subcommand)]
pub enum EnsembleCmd {
    /// Show a run's assignments and status.
    Status(StatusArgs),
    /// Merge validated mode outputs into one result.
    Synthesize(SynthesizeArgs),
    /// Stop a run, capturing partial outputs.
    Stop(StopArgs),
    /// Re-run pending and errored modes from a checkpoint.
    Resume(ResumeArgs),
    /// Re-run one mode by id or display code.
    RerunMode(RerunArgs),
    /// Delete old checkpoint runs.
    CleanCheckpoints(CleanArgs),
    /// Show provenance for synthesized findings.
    Provenance(ProvenanceArgs),
    /// `ensemble <preset> "<question>"` — start a run.
    #[command(external_subcommand)]
    Run(Vec<String>),
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Run id; latest when omitted.
    pub run: Option<String>,
}

#[derive(Debug, Args)]
pub struct SynthesizeArgs {
    pub run: Option<String>,
    /// Output format: md, json, yaml.
    #[arg(long, default_value = "md")]
    pub format: String,
    /// Override the preset's synthesis strategy.
    #[arg(long)]
    pub strategy: Option<String>,
    /// Synthesize even with unfinished or errored modes.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct StopArgs {
    pub run: Option<String>,
    /// Skip the graceful wait.
    #[arg(long)]
    pub force: bool,
    /// Skip partial-output capture.
    #[arg(long)]
    pub no_collect: bool,
    /// Suppress human output.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct ResumeArgs {
    pub run: String,
    /// Keep completed modes' outputs (pass `--skip-done=false` to re-run
    /// everything).
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub skip_done: bool,
}

#[derive(Debug, Args)]
pub struct RerunArgs {
    pub run: String,
    /// Mode id or display code.
    pub mode: String,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Remove runs not updated within this window (e.g. 168h).
    #[arg(long, value_name = "D")]
    pub max_age: Option<String>,
    /// Remove every run.
    #[arg(long)]
    pub all: bool,
    /// Report counts without deleting.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct ProvenanceArgs {
    pub run: Option<String>,
    /// Show provenance for every run.
    #[arg(long)]
    pub all: bool,
    /// Aggregate counts only.
    #[arg(long)]
    pub stats: bool,
}

fn resolve_run(runtime: &Runtime, run: Option<String>) -> Result<String> {
    match run {
        Some(run) => Ok(run),
        None => runtime
            .ensemble
            .latest_run()
            .ok_or_else(|| NtmError::NotFound("no ensemble runs recorded".into())),
    }
}

pub async fn dispatch(runtime: &Runtime, cmd: EnsembleCmd) -> Result<CmdResult> {
    match cmd {
        EnsembleCmd::Run(args) => run_cmd(runtime, args).await,
        EnsembleCmd::Status(args) => status(runtime, args),
        EnsembleCmd::Synthesize(args) => synthesize(runtime, args),
        EnsembleCmd::Stop(args) => stop(runtime, args).await,
        EnsembleCmd::Resume(args) => resume(runtime, args).await,
        EnsembleCmd::RerunMode(args) => rerun(runtime, args).await,
        EnsembleCmd::CleanCheckpoints(args) => clean(runtime, args),
        EnsembleCmd::Provenance(args) => provenance(runtime, args),
    }
}

async fn run_cmd(runtime: &Runtime, args: Vec<String>) -> Result<CmdResult> {
    let [preset_name, question_parts @ ..] = args.as_slice() else {
        return Err(NtmError::Validation(
            "usage: ensemble <preset> \"<question>\"".into(),
        ));
    };
    if question_parts.is_empty() {
        return Err(NtmError::Validation("missing question".into()));
    }
    let question = question_parts.join(" ");
    let preset = preset::resolve(preset_name)?;

    let run_id = runtime
        .ensemble
        .start(&question, &preset, &runtime.shutdown)
        .await?;
    let status = runtime.ensemble.drive(&run_id, &runtime.shutdown).await?;

    CmdResult::ok(Outcome {
        human: format!("run {run_id}: {}", status.as_str()),
        json: json!({
            "success": true,
            "run_id": run_id,
            "status": status.as_str(),
        }),
    })
}

fn status(runtime: &Runtime, args: StatusArgs) -> Result<CmdResult> {
    let run_id = resolve_run(runtime, args.run)?;
    let session = runtime.ensemble.load_session(&run_id)?;

    let mut human = format!(
        "run {} [{}] preset={} question={:?}\n",
        session.id,
        session.status.as_str(),
        session.preset_name,
        session.question
    );
    for a in &session.assignments {
        human.push_str(&format!(
            "  {:<14} {:<9} agent={} pane={}\n",
            a.mode_id,
            format!("{:?}", a.status).to_lowercase(),
            a.agent,
            a.pane.as_ref().map_or("-".to_owned(), |p| p.0.clone()),
        ));
    }
    CmdResult::ok(Outcome {
        human,
        json: json!({ "success": true, "session": session }),
    })
}

fn synthesize(runtime: &Runtime, args: SynthesizeArgs) -> Result<CmdResult> {
    let run_id = resolve_run(runtime, args.run)?;
    let format = OutputFormat::parse(&args.format)
        .ok_or_else(|| NtmError::Validation(format!("invalid format {:?}", args.format)))?;
    let strategy = args
        .strategy
        .as_deref()
        .map(|s| {
            SynthesisStrategy::parse(s)
                .ok_or_else(|| NtmError::Validation(format!("invalid strategy {s:?}")))
        })
        .transpose()?;

    let rendered =
        runtime
            .ensemble
            .synthesize_rendered(&run_id, strategy, format, args.force)?;
    CmdResult::ok(Outcome {
        human: rendered.clone(),
        json: json!({ "success": true, "run_id": run_id, "rendered": rendered }),
    })
}

async fn stop(runtime: &Runtime, args: StopArgs) -> Result<CmdResult> {
    let run_id = resolve_run(runtime, args.run)?;
    let report = runtime
        .ensemble
        .stop(&run_id, args.force, args.no_collect)
        .await?;
    let human = if args.quiet {
        String::new()
    } else {
        format!("run {run_id}: {} ({} pane(s) stopped)", report.final_status, report.stopped)
    };
    CmdResult::ok(Outcome {
        human,
        json: json!({
            "success": report.success,
            "final_status": report.final_status,
            "stopped": report.stopped,
        }),
    })
}

async fn resume(runtime: &Runtime, args: ResumeArgs) -> Result<CmdResult> {
    let rerun = runtime
        .ensemble
        .resume(&args.run, args.skip_done, &runtime.shutdown)
        .await?;
    if rerun.is_empty() {
        return CmdResult::ok(Outcome {
            human: "nothing to resume".to_owned(),
            json: json!({ "success": true, "reran": [] }),
        });
    }
    let status = runtime.ensemble.drive(&args.run, &runtime.shutdown).await?;
    CmdResult::ok(Outcome {
        human: format!(
            "resumed {} mode(s): {} -> {}",
            rerun.len(),
            rerun.join(", "),
            status.as_str()
        ),
        json: json!({ "success": true, "reran": rerun, "status": status.as_str() }),
    })
}

async fn rerun(runtime: &Runtime, args: RerunArgs) -> Result<CmdResult> {
    let mode_id = runtime
        .ensemble
        .rerun_mode(&args.run, &args.mode, &runtime.shutdown)
        .await?;
    let status = runtime.ensemble.drive(&args.run, &runtime.shutdown).await?;
    CmdResult::ok(Outcome {
        human: format!("reran mode {mode_id}: {}", status.as_str()),
        json: json!({ "success": true, "mode": mode_id, "status": status.as_str() }),
    })
}

fn clean(runtime: &Runtime, args: CleanArgs) -> Result<CmdResult> {
    if args.max_age.is_none() && !args.all {
        return Err(NtmError::Validation("pass --max-age or --all".into()));
    }
    let max_age = args.max_age.as_deref().map(parse_duration).transpose()?;
    let report = runtime.ensemble.store().clean(max_age, args.all, args.dry_run)?;
    CmdResult::ok(Outcome {
        human: format!(
            "{}removed={} kept={}",
            if report.dry_run { "dry run: " } else { "" },
            report.removed,
            report.kept
        ),
        json: json!({
            "success": true,
            "removed": report.removed,
            "kept": report.kept,
            "dry_run": report.dry_run,
        }),
    })
}

fn provenance(runtime: &Runtime, args: ProvenanceArgs) -> Result<CmdResult> {
    let runs: Vec<String> = if args.all {
        runtime.ensemble.store().list_runs()
    } else {
        vec![resolve_run(runtime, args.run)?]
    };

    let mut records = Vec::new();
    for run_id in &runs {
        if let Ok(provenance) = runtime.ensemble.provenance(run_id) {
            records.push((run_id.clone(), provenance));
        }
    }

    if args.stats {
        let findings: usize = records.iter().map(|(_, p)| p.len()).sum();
        let corroborated: usize = records
            .iter()
            .flat_map(|(_, p)| p.iter())
            .filter(|p| p.sources.len() > 1)
            .count();
        return CmdResult::ok(Outcome {
            human: format!(
                "{} run(s), {findings} finding(s), {corroborated} corroborated",
                records.len()
            ),
            json: json!({
                "success": true,
                "runs": records.len(),
                "findings": findings,
                "corroborated": corroborated,
            }),
        });
    }

    let mut human = String::new();
    for (run_id, provenance) in &records {
        human.push_str(&format!("run {run_id}:\n"));
        for p in provenance {
            human.push_str(&format!(
                "  {} [{}] conf={:.2} via {}\n",
                p.text,
                p.fingerprint,
                p.final_confidence,
                p.sources.join("+"),
            ));
        }
    }
    if records.is_empty() {
        human.push_str("no provenance recorded\n");
    }
    CmdResult::ok(Outcome {
        human,
        json: json!({
            "success": true,
            "provenance": records
                .into_iter()
                .map(|(run, p)| json!({ "run_id": run, "findings": p }))
                .collect::<Vec<_>>(),
        }),
    })
}
