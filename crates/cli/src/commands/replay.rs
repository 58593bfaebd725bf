//! `campuspilot replay` — play a recorded transcript through the driver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use campuspilot::driver_config;
use campuspilot::replay::{JsonLinesSink, Script, run_script};
use campuspilot_agent::ToolScanMode;
use campuspilot_config::AppConfig;
use campuspilot_core::Message;
use tracing::info;

pub struct ReplayArgs {
    pub script: PathBuf,
    pub chunk_size: Option<usize>,
    pub step_limit: Option<u32>,
    pub end_of_stream: bool,
    pub save: Option<PathBuf>,
}

pub async fn run(config: &AppConfig, args: ReplayArgs) -> anyhow::Result<()> {
    let script = Script::from_path(&args.script)?;

    let mut engine = driver_config(&config.agent);
    if let Some(limit) = args.step_limit {
        anyhow::ensure!(limit >= 1, "--step-limit must be at least 1");
        engine = engine.with_step_limit(limit);
    }
    if args.end_of_stream {
        engine = engine.with_scan_mode(ToolScanMode::EndOfStream);
    }

    info!(
        script = %args.script.display(),
        turns = script.turns.len(),
        tools = script.tools.len(),
        "Replaying script"
    );

    let sink = Arc::new(JsonLinesSink::new(std::io::stdout()));
    match run_script(script, engine, args.chunk_size, sink).await {
        Ok(report) => {
            eprintln!(
                "✅ Finished after {} turn(s) ({:?})",
                report.turns, report.termination
            );
            print_transcript(&report.messages);
            save(args.save.as_deref(), &report.messages)?;
            Ok(())
        }
        Err(failure) => {
            eprintln!("❌ {failure}");
            print_transcript(&failure.messages);
            save(args.save.as_deref(), &failure.messages)?;
            Err(failure.into())
        }
    }
}

fn print_transcript(messages: &[Message]) {
    eprintln!();
    for message in messages {
        eprintln!("[{}] {}", message.role, message.content);
    }
}

fn save(path: Option<&Path>, messages: &[Message]) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(messages)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    eprintln!("  Transcript saved to {}", path.display());
    Ok(())
}
