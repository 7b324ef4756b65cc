//! Lightweight scanner extracting imports and contract declarations.
//!
//! This is not a parser: it only tokenizes enough of a source unit (skipping
//! comments, recognising string literals and identifiers) to find `import`
//! statements and top-level `contract`/`interface`/`library` declarations.
//! Everything else is left to the compiler.

use serde::{Deserialize, Serialize};

/// Kind of a declared contract-like unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ContractKind {
    /// `contract Name`
    Contract,
    /// `abstract contract Name`
    Abstract,
    /// `interface Name`
    Interface,
    /// `library Name`
    Library,
}

/// A contract-like declaration found in a source unit.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Declaration {
    /// Declared name.
    pub name: String,
    /// Declaration kind.
    pub kind: ContractKind,
}

/// Result of scanning one source unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Raw import paths, in source order.
    pub imports: Vec<String>,
    /// Declarations, in source order.
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Punct(char),
}

/// Scans source text for imports and declarations.
pub fn scan(content: &str) -> ScanResult {
    let tokens = tokenize(content);
    let mut result = ScanResult::default();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Ident(word) if word == "import" => {
                let mut j = i + 1;
                while j < tokens.len() && tokens[j] != Token::Punct(';') {
                    if let Token::Str(path) = &tokens[j] {
                        result.imports.push(path.clone());
                        break;
                    }
                    j += 1;
                }
                i = j;
            }
            Token::Ident(word) => {
                let kind = match word.as_str() {
                    "contract" => {
                        let is_abstract = i > 0
                            && matches!(&tokens[i - 1], Token::Ident(prev) if prev == "abstract");
                        Some(if is_abstract {
                            ContractKind::Abstract
                        } else {
                            ContractKind::Contract
                        })
                    }
                    "interface" => Some(ContractKind::Interface),
                    "library" => Some(ContractKind::Library),
                    _ => None,
                };
                if let (Some(kind), Some(Token::Ident(name))) = (kind, tokens.get(i + 1)) {
                    result.declarations.push(Declaration {
                        name: name.clone(),
                        kind,
                    });
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
}

fn tokenize(content: &str) -> Vec<Token> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
        } else if c == '"' || c == '\'' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                }
                value.push(chars[i]);
                i += 1;
            }
            i += 1;
            tokens.push(Token::Str(value));
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_alphanumeric() {
                i += 1;
            }
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(result: &ScanResult) -> Vec<&str> {
        result
            .declarations
            .iter()
            .map(|d| d.name.as_str())
            .collect()
    }

    #[test]
    fn all_import_forms() {
        let src = r#"
import "./A.sol";
import {B, C as D} from "../lib/B.sol";
import * as E from '@oz/E.sol';
import "F.sol" as F;
"#;
        let result = scan(src);
        assert_eq!(
            result.imports,
            vec!["./A.sol", "../lib/B.sol", "@oz/E.sol", "F.sol"]
        );
    }

    #[test]
    fn declarations_in_order() {
        let src = r#"
pragma solidity 0.8.6;
interface IManager { function run() external; }
library Margin { }
abstract contract ManagerBase { }
contract PrimitiveManager is ManagerBase { }
"#;
        let result = scan(src);
        assert_eq!(
            names(&result),
            vec!["IManager", "Margin", "ManagerBase", "PrimitiveManager"]
        );
        let kinds: Vec<_> = result.declarations.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ContractKind::Interface,
                ContractKind::Library,
                ContractKind::Abstract,
                ContractKind::Contract
            ]
        );
    }

    #[test]
    fn comments_are_ignored() {
        let src = r#"
// import "./Hidden.sol";
/* contract Ghost { } */
/// @notice contract Documented
contract Real { }
"#;
        let result = scan(src);
        assert!(result.imports.is_empty());
        assert_eq!(names(&result), vec!["Real"]);
    }

    #[test]
    fn keywords_inside_strings_are_ignored() {
        let src = r#"
contract Logger {
    string constant NOTE = "contract Fake is imported";
}
"#;
        let result = scan(src);
        assert_eq!(names(&result), vec!["Logger"]);
    }

    #[test]
    fn identifiers_containing_keywords_do_not_match() {
        let src = "contract Registry { address contractAddress; uint256 libraryCount; }";
        let result = scan(src);
        assert_eq!(names(&result), vec!["Registry"]);
    }

    #[test]
    fn unterminated_comment_does_not_panic() {
        let result = scan("contract A { } /* never closed");
        assert_eq!(names(&result), vec!["A"]);
    }

    #[test]
    fn empty_source() {
        assert_eq!(scan(""), ScanResult::default());
    }
}
