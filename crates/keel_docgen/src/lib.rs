//! Documentation extraction and rendering.
//!
//! [`extract`] filters compiled contracts down to an allow-list and parses
//! their NatSpec (`devdoc` / `userdoc`) into [`ContractDoc`]s. A
//! [`DocRenderer`] turns each one into text; [`write_docs`] writes one file
//! per contract.

#![warn(missing_docs)]

pub mod error;
pub mod extract;
pub mod render;
pub mod write;

pub use error::RenderError;
pub use extract::{extract, ContractDoc, DocSet, MemberDoc};
pub use render::{DocRenderer, MarkdownRenderer, TemplateRenderer};
pub use write::{write_docs, DocFailure, DocOutput, RENDER_FAILED};
