//! Git-first prompt registry.
//!
//! Prompt specs are validated (`spec`), rendered against variable bindings
//! (`render`, guarded by `safety`), and evaluated against declarative
//! assertions (`assertions`, orchestrated by `eval`). Policies (`policy`) hook
//! into spec loading and rendering. Everything here is local and
//! deterministic; no model is ever called.
pub mod assertions;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod junit;
pub mod policy;
pub mod render;
pub mod safety;
pub mod scaffold;
pub mod spec;
pub mod store;
pub mod vault;
pub mod workflow;

mod output;
mod templates;
mod util;

pub use error::{VaultError, VaultResult};
pub use eval::{EvalReport, TestResult};
pub use spec::{LoadMode, PromptSpec};
pub use vault::PromptVault;
