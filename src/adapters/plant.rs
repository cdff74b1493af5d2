//! Robustness oracle backed by an external plant simulator process.
//!
//! The simulator is started once and kept alive for the whole run. Each
//! request is one JSON line on its stdin:
//!
//! ```text
//! {"params":[...],"layers":[...],"activation":"tanh","states":[[...],...]}
//! ```
//!
//! and each reply is one JSON line on its stdout:
//!
//! ```text
//! {"robustness":[...]}            one value per state, in order
//! {"error":"..."}                 simulation failed
//! ```

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{ControllerCheckpoint, PlantConfig, StateVector};
use crate::domain::ports::RobustnessOracle;

#[derive(Serialize)]
struct PlantRequest<'a> {
    params: &'a [f64],
    layers: &'a [usize],
    activation: &'a str,
    states: &'a [StateVector],
}

#[derive(Deserialize)]
struct PlantResponse {
    #[serde(default)]
    robustness: Vec<f64>,
    #[serde(default)]
    error: Option<String>,
}

struct PlantIo {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Long-running simulator process speaking JSON lines.
///
/// Requests are serialized through a mutex, so a whole batch is sent as a
/// single request rather than fanned out state by state.
pub struct ProcessPlant {
    command: String,
    io: Mutex<PlantIo>,
}

impl ProcessPlant {
    /// Start the simulator described by `config`.
    pub fn spawn(config: &PlantConfig) -> RepairResult<Self> {
        if config.command.is_empty() {
            return Err(RepairError::InvalidConfig(
                "plant.command is required to simulate controllers".to_string(),
            ));
        }

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                RepairError::SimulationFailed(format!("failed to spawn {}: {e}", config.command))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RepairError::SimulationFailed("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RepairError::SimulationFailed("failed to capture stdout".to_string()))?;

        info!(command = %config.command, pid = child.id(), "plant simulator started");

        Ok(Self {
            command: config.command.clone(),
            io: Mutex::new(PlantIo {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    fn request(
        &self,
        controller: &ControllerCheckpoint,
        states: &[StateVector],
    ) -> RepairResult<Vec<f64>> {
        let request = PlantRequest {
            params: &controller.params,
            layers: &controller.architecture.layers,
            activation: &controller.architecture.activation,
            states,
        };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        let mut io = self
            .io
            .lock()
            .map_err(|_| RepairError::SimulationFailed("plant connection poisoned".to_string()))?;

        io.stdin
            .write_all(line.as_bytes())
            .and_then(|()| io.stdin.flush())
            .map_err(|e| RepairError::SimulationFailed(format!("{}: {e}", self.command)))?;

        let mut reply = String::new();
        let read = io
            .stdout
            .read_line(&mut reply)
            .map_err(|e| RepairError::SimulationFailed(format!("{}: {e}", self.command)))?;
        if read == 0 {
            return Err(RepairError::SimulationFailed(format!(
                "{} closed its output",
                self.command
            )));
        }

        let response: PlantResponse = serde_json::from_str(reply.trim()).map_err(|e| {
            RepairError::SimulationFailed(format!("unreadable plant reply: {e}"))
        })?;
        if let Some(error) = response.error {
            return Err(RepairError::SimulationFailed(error));
        }
        if response.robustness.len() != states.len() {
            return Err(RepairError::SimulationFailed(format!(
                "plant returned {} values for {} states",
                response.robustness.len(),
                states.len()
            )));
        }
        debug!(states = states.len(), "plant batch simulated");
        Ok(response.robustness)
    }
}

impl RobustnessOracle for ProcessPlant {
    fn robustness(&self, controller: &ControllerCheckpoint, state: &[f64]) -> RepairResult<f64> {
        let values = self.request(controller, &[state.to_vec()])?;
        values
            .first()
            .copied()
            .ok_or_else(|| RepairError::SimulationFailed("empty plant reply".to_string()))
    }

    fn robustness_batch(
        &self,
        controller: &ControllerCheckpoint,
        states: &[StateVector],
    ) -> RepairResult<Vec<f64>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        self.request(controller, states)
    }
}

impl Drop for ProcessPlant {
    fn drop(&mut self) {
        if let Ok(io) = self.io.get_mut() {
            if let Err(e) = io.child.kill() {
                warn!(command = %self.command, error = %e, "failed to stop plant simulator");
            }
            let _ = io.child.wait();
        }
    }
}
