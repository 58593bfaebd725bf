//! Library half of the `campuspilot` binary: the transcript replay harness
//! and the mapping from file configuration to engine configuration.

pub mod replay;

use std::time::Duration;

use campuspilot_agent::{DriverConfig, ToolScanMode};
use campuspilot_config::{AgentSettings, ToolScan};

/// Build the engine's driver configuration from file settings.
pub fn driver_config(settings: &AgentSettings) -> DriverConfig {
    let mut config = DriverConfig::default()
        .with_step_limit(settings.step_limit)
        .with_scan_mode(match settings.tool_scan {
            ToolScan::EarlyExit => ToolScanMode::EarlyExit,
            ToolScan::EndOfStream => ToolScanMode::EndOfStream,
        });

    if let Some(secs) = settings.run_timeout_secs {
        config = config.with_run_timeout(Duration::from_secs(secs));
    }
    if let Some(text) = &settings.title_instruction {
        config.title_instruction = text.clone();
    }
    if let Some(text) = &settings.final_answer_directive {
        config.final_answer_directive = text.clone();
    }
    config
}
