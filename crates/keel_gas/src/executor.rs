//! The boundary to the external workload runner.

use std::time::Duration;

use keel_cache::CompiledContract;
use keel_common::CancellationToken;
use keel_compiler::{run_tool, ToolInvocation};
use serde::Deserialize;
use serde_json::json;

use crate::error::GasError;
use crate::scenario::GasScenario;

/// A single call to execute.
#[derive(Debug, Clone, Copy)]
pub struct GasCall<'a> {
    /// The scenario being run.
    pub scenario: &'a GasScenario,
    /// The compiled contract the scenario targets.
    pub contract: &'a CompiledContract,
    /// Zero-based repetition index.
    pub iteration: u32,
}

/// Executes one call and reports the gas it used.
///
/// `Ok(None)` means the call ran but no gas figure is available (reverted,
/// or the path is unreachable from the workload).
pub trait GasExecutor: Send + Sync {
    /// Runs `call`.
    fn execute(&self, call: &GasCall<'_>, cancel: &CancellationToken)
        -> Result<Option<u64>, GasError>;
}

/// Runs an external program once per call.
///
/// The program receives a JSON object on stdin with the scenario, contract
/// name, method, calldata, ABI and bytecodes, and must print
/// `{"gas": <number or null>}` on stdout.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandExecutor {
    /// Creates an executor from a command line (program followed by
    /// arguments). Returns `None` for an empty command line.
    pub fn new(argv: Vec<String>, timeout: Duration) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv, timeout })
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecutorOutput {
    gas: Option<u64>,
}

impl GasExecutor for CommandExecutor {
    fn execute(
        &self,
        call: &GasCall<'_>,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, GasError> {
        let input = json!({
            "scenario": call.scenario.name,
            "contract": call.contract.name,
            "source": call.contract.source,
            "method": call.scenario.method,
            "calldata": call.scenario.calldata,
            "iteration": call.iteration,
            "abi": call.contract.abi,
            "bytecode": call.contract.bytecode,
            "deployedBytecode": call.contract.deployed_bytecode,
        });
        let invocation = ToolInvocation::new(&self.argv[0], self.timeout)
            .args(self.argv[1..].iter().cloned())
            .stdin(input.to_string());
        let output = run_tool(&invocation, cancel)?.into_success(&self.argv[0])?;
        let parsed: ExecutorOutput = serde_json::from_str(output.stdout.trim())
            .map_err(|e| GasError::InvalidOutput(e.to_string()))?;
        Ok(parsed.gas)
    }
}
