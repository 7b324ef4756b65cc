//! Filtering compiled contracts and parsing their NatSpec.

use std::collections::{BTreeMap, HashSet};

use keel_cache::{Artifact, CompiledContract};
use serde::Serialize;
use serde_json::{Map, Value};

/// Documentation of one function, event, or error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberDoc {
    /// Signature as reported by the compiler, e.g. `deposit(uint256)`.
    pub signature: String,
    /// `@notice` text.
    pub notice: Option<String>,
    /// `@dev` text.
    pub details: Option<String>,
    /// `@param` descriptions by name.
    pub params: Vec<(String, String)>,
    /// `@return` descriptions by name (or position).
    pub returns: Vec<(String, String)>,
}

/// Documentation of one contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractDoc {
    /// Contract name.
    pub name: String,
    /// Source-unit name.
    pub source: String,
    /// `@title` text.
    pub title: Option<String>,
    /// `@author` text.
    pub author: Option<String>,
    /// Contract-level `@notice`.
    pub notice: Option<String>,
    /// Contract-level `@dev`.
    pub details: Option<String>,
    /// Documented functions, sorted by signature.
    pub functions: Vec<MemberDoc>,
    /// Documented events, sorted by signature.
    pub events: Vec<MemberDoc>,
    /// Documented custom errors, sorted by signature.
    pub errors: Vec<MemberDoc>,
}

/// The contracts selected for documentation, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocSet {
    /// Selected contracts.
    pub contracts: Vec<ContractDoc>,
}

impl DocSet {
    /// Names of the selected contracts, in output order.
    pub fn names(&self) -> Vec<&str> {
        self.contracts.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns `true` if nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Selects the contracts named in `allow_list` (exact match) and parses their
/// documentation.
///
/// Names in the allow-list that match no compiled contract are skipped.
/// Contracts keep compile order unless `alpha_sort` is set.
pub fn extract<'a, I>(artifacts: I, allow_list: &[String], alpha_sort: bool) -> DocSet
where
    I: IntoIterator<Item = &'a Artifact>,
{
    let allowed: HashSet<&str> = allow_list.iter().map(String::as_str).collect();
    let mut found = HashSet::new();
    let mut contracts = Vec::new();

    for artifact in artifacts {
        for contract in &artifact.contracts {
            if allowed.contains(contract.name.as_str()) {
                found.insert(contract.name.as_str());
                contracts.push(parse_contract(contract));
            }
        }
    }

    for name in allow_list {
        if !found.contains(name.as_str()) {
            tracing::debug!(contract = %name, "allow-listed contract not compiled; skipping");
        }
    }

    if alpha_sort {
        contracts.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.source.cmp(&b.source)));
    }
    DocSet { contracts }
}

fn parse_contract(contract: &CompiledContract) -> ContractDoc {
    let dev = parse_object(&contract.devdoc, &contract.name);
    let user = parse_object(&contract.userdoc, &contract.name);

    ContractDoc {
        name: contract.name.clone(),
        source: contract.source.clone(),
        title: text(&dev, "title"),
        author: text(&dev, "author"),
        notice: text(&user, "notice"),
        details: text(&dev, "details"),
        functions: members(&dev, &user, "methods"),
        events: members(&dev, &user, "events"),
        errors: members(&dev, &user, "errors"),
    }
}

fn parse_object(json: &str, contract: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => map,
        _ => {
            tracing::debug!(contract, "natspec is not a JSON object; ignoring");
            Map::new()
        }
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn pairs(obj: &Map<String, Value>, key: &str) -> Vec<(String, String)> {
    obj.get(key)
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Errors are documented as arrays (one entry per overload); everything else
/// as a single object.
fn entry(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(m) => Some(m),
        Value::Array(items) => items.first().and_then(Value::as_object),
        _ => None,
    }
}

fn members(dev: &Map<String, Value>, user: &Map<String, Value>, key: &str) -> Vec<MemberDoc> {
    let empty = Map::new();
    let dev = dev.get(key).and_then(Value::as_object).unwrap_or(&empty);
    let user = user.get(key).and_then(Value::as_object).unwrap_or(&empty);

    let mut by_sig: BTreeMap<&str, MemberDoc> = BTreeMap::new();
    for (sig, value) in dev {
        let Some(e) = entry(value) else { continue };
        let doc = by_sig.entry(sig.as_str()).or_default();
        doc.details = text(e, "details");
        doc.params = pairs(e, "params");
        doc.returns = pairs(e, "returns");
    }
    for (sig, value) in user {
        let Some(e) = entry(value) else { continue };
        by_sig.entry(sig.as_str()).or_default().notice = text(e, "notice");
    }

    by_sig
        .into_iter()
        .map(|(sig, mut doc)| {
            doc.signature = sig.to_string();
            doc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(name: &str, devdoc: &str, userdoc: &str) -> CompiledContract {
        CompiledContract {
            name: name.to_string(),
            source: format!("contracts/{name}.sol"),
            abi: "[]".to_string(),
            bytecode: String::new(),
            deployed_bytecode: String::new(),
            devdoc: devdoc.to_string(),
            userdoc: userdoc.to_string(),
        }
    }

    fn plain(name: &str) -> Artifact {
        Artifact::new(
            format!("contracts/{name}.sol"),
            vec![contract(name, "{}", "{}")],
        )
    }

    fn allow(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn allow_list_is_exact_filter() {
        let (foo, bar) = (plain("Foo"), plain("Bar"));
        let docs = extract([&foo, &bar], &allow(&["Foo"]), false);
        assert_eq!(docs.names(), vec!["Foo"]);
    }

    #[test]
    fn missing_names_are_skipped() {
        let foo = plain("Foo");
        let docs = extract([&foo], &allow(&["Foo", "Ghost", "Fo"]), false);
        assert_eq!(docs.names(), vec!["Foo"]);
        assert!(extract([&foo], &allow(&["Ghost"]), false).is_empty());
        assert!(extract([&foo], &[], false).is_empty());
    }

    #[test]
    fn ordering_option() {
        let (b, a) = (plain("Beta"), plain("Alpha"));
        let list = allow(&["Alpha", "Beta"]);
        assert_eq!(extract([&b, &a], &list, false).names(), vec!["Beta", "Alpha"]);
        assert_eq!(extract([&b, &a], &list, true).names(), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn parses_natspec() {
        let devdoc = r#"{
            "title": "A vault",
            "author": "keel",
            "details": "Holds tokens.",
            "methods": {
                "deposit(uint256)": {
                    "details": "Pulls tokens.",
                    "params": {"amount": "how much"},
                    "returns": {"_0": "new balance"}
                }
            },
            "events": {"Deposited(address,uint256)": {"params": {"who": "depositor"}}},
            "errors": {"Insufficient(uint256)": [{"details": "balance too low"}]}
        }"#;
        let userdoc = r#"{
            "notice": "Stores your tokens.",
            "methods": {
                "deposit(uint256)": {"notice": "Deposit tokens."},
                "withdraw()": {"notice": "Withdraw everything."}
            }
        }"#;
        let artifact = Artifact::new(
            "contracts/Vault.sol",
            vec![contract("Vault", devdoc, userdoc)],
        );
        let docs = extract([&artifact], &allow(&["Vault"]), false);
        let vault = &docs.contracts[0];

        assert_eq!(vault.title.as_deref(), Some("A vault"));
        assert_eq!(vault.author.as_deref(), Some("keel"));
        assert_eq!(vault.notice.as_deref(), Some("Stores your tokens."));
        assert_eq!(vault.details.as_deref(), Some("Holds tokens."));

        assert_eq!(vault.functions.len(), 2);
        let deposit = &vault.functions[0];
        assert_eq!(deposit.signature, "deposit(uint256)");
        assert_eq!(deposit.notice.as_deref(), Some("Deposit tokens."));
        assert_eq!(deposit.details.as_deref(), Some("Pulls tokens."));
        assert_eq!(deposit.params, vec![("amount".to_string(), "how much".to_string())]);
        assert_eq!(deposit.returns[0].1, "new balance");
        assert_eq!(vault.functions[1].signature, "withdraw()");

        assert_eq!(vault.events[0].params[0].0, "who");
        assert_eq!(vault.errors[0].details.as_deref(), Some("balance too low"));
    }

    #[test]
    fn malformed_natspec_is_empty() {
        let artifact = Artifact::new("c/X.sol", vec![contract("X", "not json", "[]")]);
        let docs = extract([&artifact], &allow(&["X"]), false);
        assert_eq!(docs.contracts[0].title, None);
        assert!(docs.contracts[0].functions.is_empty());
    }
}
