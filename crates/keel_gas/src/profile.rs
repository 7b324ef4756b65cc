//! Running scenarios and aggregating their gas.

use std::collections::BTreeMap;

use keel_cache::{Artifact, CompiledContract};
use keel_common::CancellationToken;
use keel_diagnostics::{Category, Diagnostic, DiagnosticCode};

use crate::error::GasError;
use crate::executor::{GasCall, GasExecutor};
use crate::report::{GasPrice, GasReport, GasRow};
use crate::scenario::GasScenario;

/// Code attached to notes about calls that could not be measured.
pub const UNREACHABLE_CALL: DiagnosticCode = DiagnosticCode {
    category: Category::Gas,
    number: 1,
};

#[derive(Default)]
struct Samples {
    gas: Vec<u64>,
}

/// Runs every scenario against the compiled contracts and builds the report.
///
/// A scenario naming a contract that was not compiled, a call that reports
/// no gas, and a call the executor fails on each contribute zero and add a
/// note. The only error is cancellation.
pub fn profile<'a, I>(
    artifacts: I,
    scenarios: &[GasScenario],
    executor: &dyn GasExecutor,
    price: &GasPrice,
    cancel: &CancellationToken,
) -> Result<GasReport, GasError>
where
    I: IntoIterator<Item = &'a Artifact>,
{
    let mut contracts: BTreeMap<&str, &CompiledContract> = BTreeMap::new();
    for artifact in artifacts {
        for c in &artifact.contracts {
            // First compiled contract of a name wins.
            contracts.entry(c.name.as_str()).or_insert(c);
        }
    }

    let mut sites: BTreeMap<(String, String), Samples> = BTreeMap::new();
    let mut notes = Vec::new();

    for scenario in scenarios {
        let samples = sites
            .entry((scenario.contract.clone(), scenario.method.clone()))
            .or_default();
        let Some(contract) = contracts.get(scenario.contract.as_str()).copied() else {
            notes.push(unreachable(
                scenario,
                format!("contract `{}` was not compiled", scenario.contract),
            ));
            continue;
        };

        for iteration in 0..scenario.repeat {
            if cancel.is_cancelled() {
                return Err(GasError::Cancelled);
            }
            let call = GasCall {
                scenario,
                contract,
                iteration,
            };
            match executor.execute(&call, cancel) {
                Ok(Some(gas)) => samples.gas.push(gas),
                Ok(None) => notes.push(unreachable(
                    scenario,
                    format!("call {} reported no gas", iteration + 1),
                )),
                Err(_) if cancel.is_cancelled() => return Err(GasError::Cancelled),
                Err(e) => {
                    tracing::warn!(scenario = %scenario.name, "gas executor failed: {e}");
                    notes.push(unreachable(
                        scenario,
                        format!("call {} could not be executed: {e}", iteration + 1),
                    ));
                }
            }
        }
    }

    // Sums are widened to u128; the total saturates at `u64::MAX`.
    let mut total_gas = 0u64;
    let rows: Vec<GasRow> = sites
        .into_iter()
        .map(|((contract, method), samples)| {
            let calls = samples.gas.len() as u64;
            let sum: u128 = samples.gas.iter().map(|&g| u128::from(g)).sum();
            total_gas = total_gas.saturating_add(u64::try_from(sum).unwrap_or(u64::MAX));
            let avg = if calls == 0 {
                0
            } else {
                let calls = u128::from(calls);
                // At most the largest sample.
                u64::try_from((sum + calls / 2) / calls).unwrap_or(u64::MAX)
            };
            GasRow {
                contract,
                method,
                calls,
                min: samples.gas.iter().copied().min().unwrap_or(0),
                max: samples.gas.iter().copied().max().unwrap_or(0),
                avg,
                cost: price.cost(avg),
            }
        })
        .collect();

    tracing::info!(
        sites = rows.len(),
        total_gas,
        notes = notes.len(),
        "gas profiling finished"
    );

    Ok(GasReport {
        rows,
        total_gas,
        total_cost: price.cost(total_gas),
        currency: price.currency.clone(),
        notes,
    })
}

fn unreachable(scenario: &GasScenario, message: String) -> Diagnostic {
    Diagnostic::note(
        UNREACHABLE_CALL,
        format!("gas scenario `{}`: {message}", scenario.name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns scripted gas per method; counts calls.
    struct Scripted {
        gas: HashMap<&'static str, Vec<Option<u64>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(gas: &[(&'static str, Vec<Option<u64>>)]) -> Self {
            Self {
                gas: gas.iter().cloned().collect(),
                calls: Mutex::new(0),
            }
        }
    }

    impl GasExecutor for Scripted {
        fn execute(
            &self,
            call: &GasCall<'_>,
            _cancel: &CancellationToken,
        ) -> Result<Option<u64>, GasError> {
            *self.calls.lock().unwrap() += 1;
            match self.gas.get(call.scenario.method.as_str()) {
                Some(values) => Ok(values[call.iteration as usize]),
                None => Err(GasError::InvalidOutput("boom".to_string())),
            }
        }
    }

    fn artifact(names: &[&str]) -> Artifact {
        Artifact::new(
            "contracts/Vault.sol",
            names
                .iter()
                .map(|n| CompiledContract {
                    name: n.to_string(),
                    source: "contracts/Vault.sol".to_string(),
                    abi: "[]".to_string(),
                    bytecode: "00".to_string(),
                    deployed_bytecode: "00".to_string(),
                    devdoc: "{}".to_string(),
                    userdoc: "{}".to_string(),
                })
                .collect(),
        )
    }

    fn scenario(name: &str, contract: &str, method: &str, repeat: u32) -> GasScenario {
        GasScenario {
            name: name.to_string(),
            contract: contract.to_string(),
            method: method.to_string(),
            calldata: None,
            repeat,
        }
    }

    fn usd(token_price: Option<f64>) -> GasPrice {
        GasPrice {
            price_gwei: 100.0,
            token_price,
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn aggregates_per_call_site() {
        let a = artifact(&["Vault"]);
        let executor = Scripted::new(&[
            ("deposit", vec![Some(100), Some(300), Some(200)]),
            ("withdraw", vec![Some(50)]),
        ]);
        let scenarios = [
            scenario("w", "Vault", "withdraw", 1),
            scenario("d", "Vault", "deposit", 3),
        ];
        let report = profile(
            [&a],
            &scenarios,
            &executor,
            &usd(None),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.rows.len(), 2);
        let deposit = &report.rows[0];
        assert_eq!(deposit.method, "deposit");
        assert_eq!((deposit.calls, deposit.min, deposit.max, deposit.avg), (3, 100, 300, 200));
        assert!(deposit.cost.is_none());
        assert_eq!(report.rows[1].method, "withdraw");
        assert_eq!(report.total_gas, 650);
        assert!(report.total_cost.is_none());
        assert!(report.notes.is_empty());
    }

    #[test]
    fn same_site_across_scenarios_merges() {
        let a = artifact(&["Vault"]);
        let executor = Scripted::new(&[("deposit", vec![Some(10), Some(20)])]);
        let scenarios = [
            scenario("small", "Vault", "deposit", 1),
            scenario("large", "Vault", "deposit", 2),
        ];
        let report = profile(
            [&a],
            &scenarios,
            &executor,
            &usd(Some(2000.0)),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].calls, 3);
        assert_eq!(report.rows[0].avg, 13);
        assert!(report.rows[0].cost.is_some());
    }

    #[test]
    fn unreachable_calls_are_notes() {
        let a = artifact(&["Vault"]);
        let executor = Scripted::new(&[("deposit", vec![None, Some(70)])]);
        let scenarios = [
            scenario("missing", "Ghost", "f", 1),
            scenario("reverts", "Vault", "deposit", 2),
            scenario("broken", "Vault", "explode", 1),
        ];
        let report = profile(
            [&a],
            &scenarios,
            &executor,
            &usd(None),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.notes.len(), 3);
        assert!(report.notes.iter().all(|n| !n.is_error()));
        assert!(report.notes.iter().all(|n| n.code == UNREACHABLE_CALL));
        assert!(report.notes[0].message.contains("`Ghost` was not compiled"));

        let ghost = report.rows.iter().find(|r| r.contract == "Ghost").unwrap();
        assert_eq!((ghost.calls, ghost.avg), (0, 0));
        assert_eq!(report.total_gas, 70);
        // The unknown contract is never sent to the executor.
        assert_eq!(*executor.calls.lock().unwrap(), 3);
    }

    #[test]
    fn huge_readings_saturate_instead_of_overflowing() {
        let a = artifact(&["Alpha", "Beta"]);
        let huge = u64::MAX / 2 + 1;
        let executor = Scripted::new(&[
            ("a", vec![Some(huge), Some(huge)]),
            ("b", vec![Some(u64::MAX)]),
        ]);
        let scenarios = [
            scenario("twice", "Alpha", "a", 2),
            scenario("max", "Beta", "b", 1),
        ];
        let report = profile(
            [&a],
            &scenarios,
            &executor,
            &usd(Some(2000.0)),
            &CancellationToken::new(),
        )
        .unwrap();

        let alpha = &report.rows[0];
        assert_eq!((alpha.calls, alpha.min, alpha.max, alpha.avg), (2, huge, huge, huge));
        assert_eq!(report.rows[1].avg, u64::MAX);
        assert_eq!(report.total_gas, u64::MAX);
        assert!(report.total_cost.is_some_and(f64::is_finite));
    }

    #[test]
    fn rows_ordered_by_contract_then_method() {
        let a = artifact(&["Alpha", "Beta"]);
        let executor = Scripted::new(&[("a", vec![Some(1)]), ("b", vec![Some(1)])]);
        let scenarios = [
            scenario("1", "Beta", "a", 1),
            scenario("2", "Alpha", "b", 1),
            scenario("3", "Alpha", "a", 1),
        ];
        let report = profile(
            [&a],
            &scenarios,
            &executor,
            &usd(None),
            &CancellationToken::new(),
        )
        .unwrap();
        let sites: Vec<(&str, &str)> = report
            .rows
            .iter()
            .map(|r| (r.contract.as_str(), r.method.as_str()))
            .collect();
        assert_eq!(sites, vec![("Alpha", "a"), ("Alpha", "b"), ("Beta", "a")]);
    }

    #[test]
    fn cancellation_stops_profiling() {
        let a = artifact(&["Vault"]);
        let executor = Scripted::new(&[("deposit", vec![Some(1)])]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = profile(
            [&a],
            &[scenario("d", "Vault", "deposit", 1)],
            &executor,
            &usd(None),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, GasError::Cancelled));
        assert_eq!(*executor.calls.lock().unwrap(), 0);
    }
}
