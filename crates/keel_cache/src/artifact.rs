//! Compiled artifacts: the immutable output of compiling one source unit.

use keel_diagnostics::Diagnostic;
use serde::{Deserialize, Serialize};

/// One compiled contract.
///
/// JSON-valued compiler outputs (ABI, natspec) are kept as JSON text so the
/// artifact stays serializable with any serde format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledContract {
    /// Contract name.
    pub name: String,
    /// Source-unit name the contract is declared in.
    pub source: String,
    /// ABI as JSON text.
    pub abi: String,
    /// Creation bytecode as hex, without `0x`.
    pub bytecode: String,
    /// Deployed (runtime) bytecode as hex, without `0x`.
    pub deployed_bytecode: String,
    /// Developer natspec as JSON text.
    pub devdoc: String,
    /// User natspec as JSON text.
    pub userdoc: String,
}

impl CompiledContract {
    /// Size in bytes of the deployed bytecode.
    pub fn deployed_size(&self) -> usize {
        hex_byte_len(&self.deployed_bytecode)
    }

    /// Size in bytes of the creation bytecode.
    pub fn init_size(&self) -> usize {
        hex_byte_len(&self.bytecode)
    }

    /// Returns `true` for contracts without runtime code (interfaces,
    /// abstract contracts).
    pub fn is_empty(&self) -> bool {
        self.deployed_size() == 0
    }
}

fn hex_byte_len(hex: &str) -> usize {
    hex.strip_prefix("0x").unwrap_or(hex).len() / 2
}

/// The result of compiling one source unit.
///
/// Never mutated after creation; shared as `Arc<Artifact>` between the cache
/// and every pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Source-unit name the artifact was compiled from.
    pub source: String,
    /// Contracts declared in the unit, in declaration order.
    pub contracts: Vec<CompiledContract>,
    /// Non-fatal compiler diagnostics (warnings, notes).
    pub diagnostics: Vec<Diagnostic>,
}

impl Artifact {
    /// Creates an artifact without diagnostics.
    pub fn new(source: impl Into<String>, contracts: Vec<CompiledContract>) -> Self {
        Self {
            source: source.into(),
            contracts,
            diagnostics: Vec::new(),
        }
    }

    /// Looks up a contract by name.
    pub fn contract(&self, name: &str) -> Option<&CompiledContract> {
        self.contracts.iter().find(|c| c.name == name)
    }

    /// Names of the compiled contracts, in declaration order.
    pub fn contract_names(&self) -> Vec<String> {
        self.contracts.iter().map(|c| c.name.clone()).collect()
    }
}
