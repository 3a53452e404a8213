//! TOML-driven test scenarios.
//!
//! A scenario names a channel configuration, a list of timed actions
//! (application sends and deterministic one-shot faults), and a list of
//! assertions checked after the run. Scenarios double as regression tests
//! for the classic ARQ edge cases (lost data frame, lost cumulative ACK).

use std::fs;

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::info;

use arq_lab_core::{ArqEndpoint, ChannelConfig};

use crate::engine::Simulator;
use crate::trace::SimulationReport;

const DEFAULT_MAX_DURATION_MS: u64 = 60_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ArqScenario {
    pub name: String,
    pub description: String,
    pub config: ChannelOverride,
    pub actions: Vec<ScenarioAction>,
    pub assertions: Vec<ScenarioAssertion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelOverride {
    pub loss_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl ChannelOverride {
    pub fn apply_to(&self, config: &mut ChannelConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// Application hands `data` to the sender at `time`.
    AppSend { time: u64, data: String },
    /// Drop the first data frame with this sequence number.
    DropNextDataSeq { seq: u32 },
    /// Drop the first ACK with this sequence number.
    DropNextAckSeq { ack: u32 },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioAssertion {
    /// A specific payload reached the receiving application.
    DataDelivered { data: String },
    /// Exactly `count` payloads were delivered, in admission order.
    DeliveredInOrder { count: u32 },
    /// Total sender transmissions (including retransmissions) within range.
    SenderFrameCount { min: u32, max: Option<u32> },
    /// The simulation finishes within this many milliseconds.
    MaxDuration { ms: u64 },
}

/// Load a scenario file, run it, and check every assertion.
pub fn run_scenario(
    scenario_path: &str,
    sender: Box<dyn ArqEndpoint>,
    receiver: Box<dyn ArqEndpoint>,
) -> anyhow::Result<SimulationReport> {
    let content = fs::read_to_string(scenario_path)
        .with_context(|| format!("failed to read scenario file {scenario_path}"))?;
    let scenario: ArqScenario = toml::from_str(&content).context("failed to parse scenario")?;
    run_parsed_scenario(&scenario, sender, receiver)
}

pub fn run_parsed_scenario(
    scenario: &ArqScenario,
    sender: Box<dyn ArqEndpoint>,
    receiver: Box<dyn ArqEndpoint>,
) -> anyhow::Result<SimulationReport> {
    info!("running scenario: {}", scenario.name);
    info!("{}", scenario.description);

    let mut config = ChannelConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config, sender, receiver);

    let mut expected_payloads = Vec::new();
    for action in &scenario.actions {
        match action {
            ScenarioAction::AppSend { time, data } => {
                expected_payloads.push(data.as_bytes().to_vec());
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            ScenarioAction::DropNextDataSeq { seq } => sim.add_drop_data_seq_once(*seq),
            ScenarioAction::DropNextAckSeq { ack } => sim.add_drop_ack_seq_once(*ack),
        }
    }

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| match a {
            ScenarioAssertion::MaxDuration { ms } => Some(*ms),
            _ => None,
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    sim.init();
    while sim.step() {
        if sim.current_time() > max_duration {
            return Err(anyhow!("scenario timed out after {max_duration} ms"));
        }
    }

    for assertion in &scenario.assertions {
        match assertion {
            ScenarioAssertion::DataDelivered { data } => {
                if !sim.delivered_data.iter().any(|d| d == data.as_bytes()) {
                    return Err(anyhow!("assertion failed: {data:?} was not delivered"));
                }
            }
            ScenarioAssertion::DeliveredInOrder { count } => {
                let expected: Vec<Vec<u8>> =
                    expected_payloads.iter().take(*count as usize).cloned().collect();
                if sim.delivered_data != expected {
                    return Err(anyhow!(
                        "assertion failed: expected {} payloads in admission order, got {:?}",
                        count,
                        sim.delivered_data
                    ));
                }
            }
            ScenarioAssertion::SenderFrameCount { min, max } => {
                if sim.sender_frame_count < *min {
                    return Err(anyhow!(
                        "assertion failed: sender transmitted {} frames, expected at least {min}",
                        sim.sender_frame_count
                    ));
                }
                if let Some(max) = max
                    && sim.sender_frame_count > *max
                {
                    return Err(anyhow!(
                        "assertion failed: sender transmitted {} frames, expected at most {max}",
                        sim.sender_frame_count
                    ));
                }
            }
            ScenarioAssertion::MaxDuration { .. } => {} // enforced during the run
        }
    }

    info!("scenario passed: {}", scenario.name);
    Ok(sim.export_report())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_toml_parses() {
        let toml_text = r#"
            name = "lost ack"
            description = "cumulative ACK recovers a dropped ACK"

            [config]
            loss_rate = 0.0
            seed = 1

            [[actions]]
            type = "app_send"
            time = 0
            data = "Packet-0"

            [[actions]]
            type = "drop_next_ack_seq"
            ack = 0

            [[assertions]]
            type = "data_delivered"
            data = "Packet-0"

            [[assertions]]
            type = "max_duration"
            ms = 30000
        "#;
        let scenario: ArqScenario = toml::from_str(toml_text).unwrap();
        assert_eq!(scenario.name, "lost ack");
        assert_eq!(scenario.actions.len(), 2);
        assert_eq!(scenario.assertions.len(), 2);
    }
}
