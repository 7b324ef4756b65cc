//! Gas profiler.
//!
//! Runs user-declared call scenarios against compiled contracts through a
//! [`GasExecutor`] and aggregates the reported gas per `(contract, method)`
//! call site. Calls that cannot be executed contribute nothing and leave a
//! note in the report; they never fail the build.

#![warn(missing_docs)]

pub mod error;
pub mod executor;
pub mod profile;
pub mod report;
pub mod scenario;

pub use error::GasError;
pub use executor::{CommandExecutor, GasCall, GasExecutor};
pub use profile::{profile, UNREACHABLE_CALL};
pub use report::{GasPrice, GasReport, GasRow};
pub use scenario::{load_scenarios, parse_scenarios, GasScenario};
