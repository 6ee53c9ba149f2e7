// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI surface. Every command supports `--json`; human output is one
//! screenful of plain text. Exit codes: 0 success, 1 failure, 2 preflight
//! blocked.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crate::agent::AgentType;
use crate::bundle;
use crate::config::{state_dir, Config};
use crate::copy;
use crate::dispatch::{batch, ReservationPolicy, SendOptions, Targeting};
use crate::error::{NtmError, Result};
use crate::naming::SessionName;
use crate::preflight;
use crate::redact::RedactionMode;
use crate::runtime::Runtime;

mod ensemble_cmd;

pub use ensemble_cmd::EnsembleCmd;

/// Multi-agent terminal orchestrator.
#[derive(Debug, Parser)]
#[command(name = "ntm", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a session and spawn agent panes into it.
    Spawn(SpawnArgs),
    /// Create a session with plain panes.
    Create(CreateArgs),
    /// One-shot project session: a claude pane plus a user shell.
    Quick(QuickArgs),
    /// Add agent panes to an existing session.
    Add(AddArgs),
    /// Send a prompt to session panes.
    Send(SendArgs),
    /// Ctrl-C the agent panes of a session.
    Interrupt(SessionArg),
    /// Kill a session.
    Kill(KillArgs),
    /// Capture pane text to the clipboard.
    Copy(CopyArgs),
    /// Lint a prompt without sending it.
    Preflight(PreflightArgs),
    /// Ensemble reasoning runs.
    #[command(subcommand)]
    Ensemble(EnsembleCmd),
    /// Archive orchestrator state for debugging.
    SupportBundle(BundleArgs),
    /// List active file reservations for a project.
    Changes(OptionalSessionArg),
    /// List conflicting exclusive reservations for a project.
    Conflicts(OptionalSessionArg),
}

#[derive(Debug, Args)]
pub struct AgentCounts {
    /// Claude panes to spawn.
    #[arg(long = "cc", value_name = "N", default_value_t = 0)]
    pub claude: usize,
    /// Codex panes to spawn.
    #[arg(long = "cod", value_name = "N", default_value_t = 0)]
    pub codex: usize,
    /// Gemini panes to spawn.
    #[arg(long = "gmi", value_name = "N", default_value_t = 0)]
    pub gemini: usize,
}

impl AgentCounts {
    pub fn to_vec(&self) -> Vec<(AgentType, usize)> {
        [
            (AgentType::Claude, self.claude),
            (AgentType::Codex, self.codex),
            (AgentType::Gemini, self.gemini),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}

#[derive(Debug, Args)]
pub struct SpawnArgs {
    /// Base project name (no `--`).
    pub base: String,
    /// Session label; final name is `<base>--<label>`.
    #[arg(long)]
    pub label: Option<String>,
    #[command(flatten)]
    pub counts: AgentCounts,
    /// Also open a user shell pane.
    #[arg(long)]
    pub user: bool,
    /// Plan without creating anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    pub base: String,
    #[arg(long)]
    pub label: Option<String>,
    /// Number of plain shell panes.
    #[arg(long, default_value_t = 1)]
    pub panes: usize,
}

#[derive(Debug, Args)]
pub struct QuickArgs {
    pub base: String,
    /// Skip git-oriented setup.
    #[arg(long)]
    pub no_git: bool,
    /// Skip editor launch.
    #[arg(long)]
    pub no_vscode: bool,
    /// Skip the claude pane.
    #[arg(long)]
    pub no_claude: bool,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Base session name.
    pub session: String,
    #[arg(long)]
    pub label: Option<String>,
    #[command(flatten)]
    pub counts: AgentCounts,
}

#[derive(Debug, Args)]
pub struct SessionArg {
    pub session: String,
}

#[derive(Debug, Args)]
pub struct OptionalSessionArg {
    pub session: Option<String>,
}

#[derive(Debug, Args)]
pub struct KillArgs {
    pub session: String,
    /// Skip the graceful interrupt-and-wait.
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    pub session: String,
    /// Prompt text (joined with spaces).
    #[arg(trailing_var_arg = true)]
    pub prompt: Vec<String>,
    /// Target claude panes.
    #[arg(long = "cc")]
    pub claude: bool,
    /// Target codex panes.
    #[arg(long = "cod")]
    pub codex: bool,
    /// Target gemini panes.
    #[arg(long = "gmi")]
    pub gemini: bool,
    /// Target every pane, shells included.
    #[arg(long)]
    pub all: bool,
    /// Explicit pane indices.
    #[arg(long = "pane", value_name = "N")]
    pub panes: Vec<usize>,
    /// Target panes carrying any of these tags.
    #[arg(long = "tag", value_name = "T")]
    pub tags: Vec<String>,
    /// Skip the lowest-indexed pane.
    #[arg(long)]
    pub skip_first: bool,
    #[arg(long)]
    pub dry_run: bool,
    /// Batch file of prompts.
    #[arg(long, value_name = "FILE")]
    pub batch: Option<PathBuf>,
    #[arg(long)]
    pub base_prompt: Option<String>,
    #[arg(long, value_name = "FILE")]
    pub base_prompt_file: Option<PathBuf>,
    /// Redaction mode: off, warn, redact, block.
    #[arg(long = "redact", value_name = "MODE")]
    pub redact: Option<String>,
    /// Disable redaction scanning for this send.
    #[arg(long)]
    pub no_redact: bool,
    /// Strict preflight: warnings block.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct CopyArgs {
    pub session: String,
    /// Capture every pane.
    #[arg(long)]
    pub all: bool,
    #[arg(long = "cc")]
    pub claude: bool,
    #[arg(long = "cod")]
    pub codex: bool,
    #[arg(long = "gmi")]
    pub gemini: bool,
    /// Explicit pane index.
    #[arg(long = "pane", value_name = "N")]
    pub pane: Option<usize>,
    /// Scrollback lines per pane.
    #[arg(short = 'l', long, default_value_t = 200)]
    pub lines: usize,
    /// Keep only lines matching this pattern.
    #[arg(short = 'p', long, value_name = "REGEX")]
    pub pattern: Option<String>,
    /// Keep only fenced code blocks.
    #[arg(long)]
    pub code: bool,
}

#[derive(Debug, Args)]
pub struct PreflightArgs {
    /// Prompt text, or `-` to read stdin.
    pub prompt: String,
    #[arg(long)]
    pub strict: bool,
    /// Show the redacted rendering.
    #[arg(long)]
    pub preview: bool,
}

#[derive(Debug, Args)]
pub struct BundleArgs {
    pub session: Option<String>,
    /// Output path; default `./ntm-bundle-<timestamp>.<ext>`.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
    /// Archive format: zip or tar.gz.
    #[arg(long, default_value = "zip")]
    pub format: String,
    /// Only include files newer than this (e.g. 24h, 7d).
    #[arg(long, value_name = "DUR")]
    pub since: Option<String>,
    /// Pane capture depth.
    #[arg(long, default_value_t = 200)]
    pub lines: usize,
    /// Per-file size cap in megabytes.
    #[arg(long, value_name = "MB")]
    pub max_size: Option<u64>,
    #[arg(long = "redact", value_name = "MODE")]
    pub redact: Option<String>,
    #[arg(long)]
    pub no_redact: bool,
    /// Include every session's files.
    #[arg(long)]
    pub all: bool,
}

/// Rendered command output.
pub struct Outcome {
    pub human: String,
    pub json: serde_json::Value,
}

/// Output plus process exit code.
pub struct CmdResult {
    pub outcome: Outcome,
    pub exit: i32,
}

impl CmdResult {
    fn ok(outcome: Outcome) -> Result<Self> {
        Ok(Self { outcome, exit: 0 })
    }
}

/// Parse a human duration: `90s`, `45m`, `168h`, `7d`. A bare number is
/// hours.
pub fn parse_duration(s: &str) -> Result<chrono::Duration> {
    let s = s.trim();
    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => s.split_at(split),
        None => (s, "h"),
    };
    let n: i64 = value
        .parse()
        .map_err(|_| NtmError::Validation(format!("invalid duration {s:?}")))?;
    match unit {
        "s" => Ok(chrono::Duration::seconds(n)),
        "m" => Ok(chrono::Duration::minutes(n)),
        "h" => Ok(chrono::Duration::hours(n)),
        "d" => Ok(chrono::Duration::days(n)),
        _ => Err(NtmError::Validation(format!("invalid duration unit {unit:?}"))),
    }
}

fn parse_redaction(
    flag: &Option<String>,
    no_redact: bool,
) -> Result<Option<RedactionMode>> {
    if no_redact {
        return Ok(Some(RedactionMode::Off));
    }
    match flag {
        None => Ok(None),
        Some(s) => RedactionMode::parse(s)
            .map(Some)
            .ok_or_else(|| NtmError::Validation(format!("invalid redaction mode {s:?}"))),
    }
}

/// Resolve the project working directory for a base name: `<cwd>/<base>`
/// when it exists, the cwd itself otherwise.
fn project_dir(base: &str) -> String {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidate = cwd.join(base);
    if candidate.is_dir() {
        candidate.display().to_string()
    } else {
        cwd.display().to_string()
    }
}

/// Execute a parsed CLI invocation against a runtime.
pub async fn dispatch(command: Commands, runtime: &Runtime) -> Result<CmdResult> {
    match command {
        Commands::Spawn(args) => spawn(runtime, args).await,
        Commands::Create(args) => create(runtime, args).await,
        Commands::Quick(args) => quick(runtime, args).await,
        Commands::Add(args) => add(runtime, args).await,
        Commands::Send(args) => send(runtime, args).await,
        Commands::Interrupt(args) => interrupt(runtime, args).await,
        Commands::Kill(args) => kill(runtime, args).await,
        Commands::Copy(args) => copy_cmd(runtime, args).await,
        Commands::Preflight(args) => preflight_cmd(args),
        Commands::Ensemble(cmd) => ensemble_cmd::dispatch(runtime, cmd).await,
        Commands::SupportBundle(args) => support_bundle(runtime, args).await,
        Commands::Changes(args) => changes(runtime, args),
        Commands::Conflicts(args) => conflicts(runtime, args),
    }
}

async fn spawn_counts(
    runtime: &Runtime,
    base: &str,
    label: Option<&str>,
    counts: Vec<(AgentType, usize)>,
    dry_run: bool,
) -> Result<CmdResult> {
    let name = SessionName::new(base, label)?;
    let report = runtime
        .lifecycle
        .spawn(
            crate::lifecycle::SpawnSpec {
                name: name.clone(),
                counts,
                working_dir: project_dir(name.base()),
                dry_run,
            },
            &runtime.shutdown,
        )
        .await?;

    let human = if dry_run {
        format!(
            "would spawn {} pane(s) in {}",
            report.planned_commands.len(),
            report.session
        )
    } else {
        format!(
            "session {}: {} pane(s) spawned, {} failed",
            report.session,
            report.panes.len(),
            report.failed
        )
    };
    CmdResult::ok(Outcome {
        human,
        json: json!({ "success": report.failed == 0, "report": report }),
    })
}

async fn spawn(runtime: &Runtime, args: SpawnArgs) -> Result<CmdResult> {
    let mut counts = args.counts.to_vec();
    if args.user {
        counts.push((AgentType::User, 1));
    }
    if counts.is_empty() {
        return Err(NtmError::Validation(
            "nothing to spawn: pass --cc/--cod/--gmi/--user".into(),
        ));
    }
    spawn_counts(runtime, &args.base, args.label.as_deref(), counts, args.dry_run).await
}

async fn create(runtime: &Runtime, args: CreateArgs) -> Result<CmdResult> {
    let counts = vec![(AgentType::User, args.panes.max(1))];
    spawn_counts(runtime, &args.base, args.label.as_deref(), counts, false).await
}

async fn quick(runtime: &Runtime, args: QuickArgs) -> Result<CmdResult> {
    let mut counts = Vec::new();
    if !args.no_claude {
        counts.push((AgentType::Claude, 1));
    }
    counts.push((AgentType::User, 1));
    spawn_counts(runtime, &args.base, None, counts, false).await
}

async fn add(runtime: &Runtime, args: AddArgs) -> Result<CmdResult> {
    let name = SessionName::new(&args.session, args.label.as_deref())?;
    let counts = args.counts.to_vec();
    if counts.is_empty() {
        return Err(NtmError::Validation("nothing to add: pass --cc/--cod/--gmi".into()));
    }
    // Adopt existing panes so type ordinals continue rather than restart.
    let _ = runtime.lifecycle.adopt_session(&name.full()).await;
    let report = runtime
        .lifecycle
        .add(&name, counts, project_dir(name.base()), &runtime.shutdown)
        .await?;
    CmdResult::ok(Outcome {
        human: format!(
            "session {}: added {} pane(s), {} failed",
            report.session,
            report.panes.len(),
            report.failed
        ),
        json: json!({ "success": report.failed == 0, "report": report }),
    })
}

async fn send(runtime: &Runtime, args: SendArgs) -> Result<CmdResult> {
    let name = SessionName::parse(&args.session)?;
    runtime.lifecycle.adopt_session(&name.full()).await?;

    let mut types = Vec::new();
    if args.claude {
        types.push(AgentType::Claude);
    }
    if args.codex {
        types.push(AgentType::Codex);
    }
    if args.gemini {
        types.push(AgentType::Gemini);
    }
    let targeting = if !args.panes.is_empty() {
        Targeting::Panes(args.panes.clone())
    } else if !args.tags.is_empty() {
        Targeting::Tags(args.tags.clone())
    } else if args.all {
        Targeting::All
    } else if !types.is_empty() {
        Targeting::Types(types)
    } else {
        Targeting::Agents
    };

    let options = SendOptions {
        targeting,
        skip_first: args.skip_first,
        dry_run: args.dry_run,
        strict: args.strict,
        redaction: parse_redaction(&args.redact, args.no_redact)?,
        smart_routing: runtime.config.smart_routing,
        base_prompt: args.base_prompt.clone(),
        base_prompt_file: args.base_prompt_file.clone(),
        reserve_patterns: vec![],
        reserve_exclusive: false,
        reservation_policy: ReservationPolicy::Fail,
    };

    if let Some(batch_path) = &args.batch {
        let contents = std::fs::read_to_string(batch_path).map_err(|e| {
            NtmError::Validation(format!("batch file {}: {e}", batch_path.display()))
        })?;
        let prompts = batch::parse(&contents)?;
        let reports = runtime.dispatcher.send_batch(&name, prompts, &options).await?;
        let delivered: usize = reports.iter().map(|r| r.delivered).sum();
        let failed: usize = reports.iter().map(|r| r.failed).sum();
        return CmdResult::ok(Outcome {
            human: format!(
                "batch: {} prompt(s), {delivered} delivered, {failed} failed",
                reports.len()
            ),
            json: json!({ "success": failed == 0, "reports": reports }),
        });
    }

    let prompt = args.prompt.join(" ");
    let report = runtime.dispatcher.send(&name, &prompt, &options).await?;
    let human = if report.dry_run {
        format!(
            "dry run: would send to pane(s) {:?}\n---\n{}",
            report.targets, report.final_prompt
        )
    } else {
        format!(
            "sent to {} pane(s), {} failed{}",
            report.delivered,
            report.failed,
            if report.warnings.is_empty() {
                String::new()
            } else {
                format!("\nwarnings: {}", report.warnings.join("; "))
            }
        )
    };
    CmdResult::ok(Outcome {
        human,
        json: json!({ "success": report.failed == 0, "report": report }),
    })
}

async fn interrupt(runtime: &Runtime, args: SessionArg) -> Result<CmdResult> {
    let name = SessionName::parse(&args.session)?;
    runtime.lifecycle.adopt_session(&name.full()).await?;
    let hit = runtime.lifecycle.interrupt(&name).await?;
    CmdResult::ok(Outcome {
        human: format!("interrupted {hit} agent pane(s)"),
        json: json!({ "success": true, "interrupted": hit }),
    })
}

async fn kill(runtime: &Runtime, args: KillArgs) -> Result<CmdResult> {
    let name = SessionName::parse(&args.session)?;
    let _ = runtime.lifecycle.adopt_session(&name.full()).await;
    runtime
        .lifecycle
        .kill(&name, args.force, std::time::Duration::from_secs(2))
        .await?;
    CmdResult::ok(Outcome {
        human: format!("killed session {}", name.full()),
        json: json!({ "success": true }),
    })
}

async fn copy_cmd(runtime: &Runtime, args: CopyArgs) -> Result<CmdResult> {
    let name = SessionName::parse(&args.session)?;
    runtime.lifecycle.adopt_session(&name.full()).await?;

    let records = runtime.lifecycle.panes_in(&name.full());
    let selected: Vec<_> = records
        .into_iter()
        .filter(|r| {
            if let Some(index) = args.pane {
                return r.index == index;
            }
            if args.all {
                return true;
            }
            let mut wanted = Vec::new();
            if args.claude {
                wanted.push(AgentType::Claude);
            }
            if args.codex {
                wanted.push(AgentType::Codex);
            }
            if args.gemini {
                wanted.push(AgentType::Gemini);
            }
            if wanted.is_empty() {
                r.agent.is_agent()
            } else {
                wanted.contains(&r.agent)
            }
        })
        .collect();
    if selected.is_empty() {
        return Err(NtmError::NotFound("no matching panes to copy".into()));
    }

    let mut chunks = Vec::new();
    for record in &selected {
        let text = runtime.mux.capture(&record.id, args.lines).await?;
        chunks.push(text);
    }
    let mut text = chunks.join("\n");
    if let Some(pattern) = &args.pattern {
        text = copy::filter_lines(&text, pattern)?;
    }
    if args.code {
        text = copy::extract_code_blocks(&text);
    }

    let bytes = text.len();
    copy::copy_to_clipboard(&text).await?;
    CmdResult::ok(Outcome {
        human: format!("copied {bytes} byte(s) from {} pane(s)", selected.len()),
        json: json!({ "success": true, "bytes": bytes, "panes": selected.len() }),
    })
}

fn preflight_cmd(args: PreflightArgs) -> Result<CmdResult> {
    let prompt = if args.prompt == "-" {
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
            .map_err(|e| NtmError::Validation(format!("stdin: {e}")))?;
        buffer
    } else {
        args.prompt.clone()
    };

    let report = preflight::run(&prompt, args.strict);
    let mut human = String::new();
    for finding in &report.findings {
        human.push_str(&format!(
            "{}: {} ({})\n",
            finding.severity.as_str(),
            finding.message,
            finding.rule
        ));
    }
    if report.findings.is_empty() {
        human.push_str("clean\n");
    }
    let mut json = json!({
        "success": !report.is_blocked(),
        "blocked": report.is_blocked(),
        "findings": report.findings,
    });
    if args.preview {
        let preview = crate::redact::redactor()
            .apply(&prompt, RedactionMode::Redact)
            .text;
        human.push_str(&format!("---\n{preview}\n"));
        if let Some(map) = json.as_object_mut() {
            map.insert("preview".to_owned(), json!(preview));
        }
    }
    Ok(CmdResult {
        outcome: Outcome { human, json },
        exit: if report.is_blocked() { 2 } else { 0 },
    })
}

async fn support_bundle(runtime: &Runtime, args: BundleArgs) -> Result<CmdResult> {
    let format = bundle::BundleFormat::parse(&args.format)
        .ok_or_else(|| NtmError::Validation(format!("invalid format {:?}", args.format)))?;
    let since = args.since.as_deref().map(parse_duration).transpose()?;
    let redaction = parse_redaction(&args.redact, args.no_redact)?
        .unwrap_or(runtime.config.redaction.mode);

    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "ntm-bundle-{}.{}",
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            format.extension()
        ))
    });

    // Live pane captures for the named session.
    let mut extra: Vec<(String, String)> = Vec::new();
    if let Some(session) = &args.session {
        let name = SessionName::parse(session)?;
        if runtime.lifecycle.adopt_session(&name.full()).await.is_ok() {
            for record in runtime.lifecycle.panes_in(&name.full()) {
                if let Ok(text) = runtime.mux.capture(&record.id, args.lines).await {
                    extra.push((format!("captures/{}.txt", record.title), text));
                }
            }
        }
    }
    // Recent bus events.
    let events = runtime.bus.history(200);
    if !events.is_empty() {
        let lines: Vec<String> = events
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect();
        extra.push(("events/recent.jsonl".to_owned(), lines.join("\n")));
    }

    let options = bundle::BundleOptions {
        output: output.clone(),
        format,
        session: args.session.clone(),
        since,
        lines: args.lines,
        max_size_bytes: args.max_size.map(|mb| mb * 1024 * 1024),
        redaction,
        include_all: args.all || args.session.is_none(),
    };
    let manifest = bundle::create(&state_dir(), &options, extra)?;

    CmdResult::ok(Outcome {
        human: format!(
            "wrote {} ({} file(s), {} redacted)",
            output.display(),
            manifest.files.len(),
            manifest.redaction_summary.files_redacted
        ),
        json: json!({ "success": true, "output": output, "manifest": manifest }),
    })
}

fn changes(runtime: &Runtime, args: OptionalSessionArg) -> Result<CmdResult> {
    let project = args.session.as_deref().unwrap_or_default();
    let active = runtime.reservations.active(project);
    let mut human = String::new();
    for r in &active {
        human.push_str(&format!(
            "{} {} {} (until {})\n",
            if r.exclusive { "excl" } else { "shared" },
            r.agent,
            r.pattern,
            r.expires_at.format("%H:%M:%S")
        ));
    }
    if active.is_empty() {
        human.push_str("no active reservations\n");
    }
    CmdResult::ok(Outcome {
        human,
        json: json!({ "success": true, "reservations": active }),
    })
}

fn conflicts(runtime: &Runtime, args: OptionalSessionArg) -> Result<CmdResult> {
    let project = args.session.as_deref().unwrap_or_default();
    let pairs = runtime.reservations.conflicts(project);
    let mut human = String::new();
    for (a, b) in &pairs {
        human.push_str(&format!(
            "{} ({}) overlaps {} ({})\n",
            a.pattern, a.agent, b.pattern, b.agent
        ));
    }
    if pairs.is_empty() {
        human.push_str("no conflicts\n");
    }
    CmdResult::ok(Outcome {
        human,
        json: json!({ "success": true, "conflicts": pairs }),
    })
}

/// Top-level entry: build a runtime, execute, render, return the exit code.
pub async fn run(cli: Cli) -> i32 {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 1;
        }
    };
    let runtime = Runtime::with_tmux(config);
    let json = cli.json;
    let result = dispatch(cli.command, &runtime).await;
    runtime.stop().await;

    match result {
        Ok(CmdResult { outcome, exit }) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome.json)
                        .unwrap_or_else(|_| "{}".to_owned())
                );
            } else {
                print!("{}", ensure_newline(outcome.human));
            }
            exit
        }
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&e.to_json())
                        .unwrap_or_else(|_| "{}".to_owned())
                );
            } else {
                eprintln!("error: {e}");
            }
            e.kind().exit_code()
        }
    }
}

fn ensure_newline(mut s: String) -> String {
    if !s.ends_with('\n') && !s.is_empty() {
        s.push('\n');
    }
    s
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
