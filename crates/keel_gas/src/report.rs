//! Gas report rows, totals, and cost estimation.

use std::fmt;

use keel_diagnostics::Diagnostic;
use serde::Serialize;

/// Prices used to turn gas into a cost estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasPrice {
    /// Gas price in gwei.
    pub price_gwei: f64,
    /// Price of one native token in `currency`. Without it no costs are
    /// computed.
    pub token_price: Option<f64>,
    /// Currency code costs are reported in.
    pub currency: String,
}

impl GasPrice {
    /// Cost of `gas` in the configured currency, if a token price is known.
    pub fn cost(&self, gas: u64) -> Option<f64> {
        self.token_price
            .map(|token| gas as f64 * self.price_gwei * 1e-9 * token)
    }
}

/// Aggregated measurements for one `(contract, method)` call site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasRow {
    /// Contract name.
    pub contract: String,
    /// Method as named by the scenarios.
    pub method: String,
    /// Number of calls that reported gas.
    pub calls: u64,
    /// Lowest gas of a single call.
    pub min: u64,
    /// Highest gas of a single call.
    pub max: u64,
    /// Mean gas per call, rounded to the nearest unit.
    pub avg: u64,
    /// Cost of an average call.
    pub cost: Option<f64>,
}

/// Per-call-site gas usage of a build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasReport {
    /// Rows ordered by `(contract, method)`.
    pub rows: Vec<GasRow>,
    /// Gas used by all measured calls.
    pub total_gas: u64,
    /// Cost of `total_gas`.
    pub total_cost: Option<f64>,
    /// Currency of the costs.
    pub currency: String,
    /// Notes for calls that could not be measured.
    pub notes: Vec<Diagnostic>,
}

impl fmt::Display for GasReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let site = |r: &GasRow| format!("{}.{}", r.contract, r.method);
        let width = self
            .rows
            .iter()
            .map(|r| site(r).len())
            .chain(std::iter::once("Method".len()))
            .max()
            .unwrap_or(0);
        let cost_header = format!("{} (avg)", self.currency);

        writeln!(
            f,
            "{:<width$}  {:>6}  {:>10}  {:>10}  {:>10}  {:>12}",
            "Method", "Calls", "Min", "Max", "Avg", cost_header
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<width$}  {:>6}  {:>10}  {:>10}  {:>10}  {:>12}",
                site(row),
                row.calls,
                row.min,
                row.max,
                row.avg,
                format_cost(row.cost)
            )?;
        }
        writeln!(
            f,
            "{:<width$}  {:>6}  {:>10}  {:>10}  {:>10}  {:>12}",
            "Total",
            "",
            "",
            "",
            self.total_gas,
            format_cost(self.total_cost)
        )
    }
}

fn format_cost(cost: Option<f64>) -> String {
    cost.map_or_else(|| "-".to_string(), |c| format!("{c:.4}"))
}
