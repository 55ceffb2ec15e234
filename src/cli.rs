//! CLI argument parsing for the prompt registry.
//!
//! The CLI only wires arguments to the library: every command reads specs
//! through the store, runs the core pipeline, and reports.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_BUNDLE_OUT: &str = "out/pvault.bundle.json";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "pvault",
    version,
    about = "Git-first prompt registry: validate, render, and evaluate prompt specs",
    after_help = "Examples:\n  pvault init --repo .\n  pvault validate prompts\n  pvault render prompts/hello_world.prompt.yml --vars '{\"name\": \"Ava\"}'\n  pvault eval prompts/hello_world.prompt.yml --report out/report.json --junit out/junit.xml\n  pvault diff prompts/hello_world.prompt.yml --ref1 v1 --ref2 HEAD\n  pvault bundle --ref v1 --out out/pvault.bundle.json\n\nLogging is controlled by PVAULT_LOG (e.g. PVAULT_LOG=debug).",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Validate(ValidateArgs),
    Render(RenderArgs),
    Eval(EvalArgs),
    Diff(DiffArgs),
    Resolve(ResolveArgs),
    Bundle(BundleArgs),
}

/// Repository root shared by every command that reads prompts.
#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    /// Repository root containing prompts and .pvault/config.json
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub repo: PathBuf,
}

/// Safety guard toggles; each flag adds to the configured defaults.
#[derive(Args, Debug, Clone, Copy)]
pub struct SafetyArgs {
    /// Reject vars or rendered output that look like credentials
    #[arg(long)]
    pub safe: bool,

    /// With --safe, replace detected credentials in rendered output instead of failing
    #[arg(long)]
    pub redact: bool,

    /// Reject vars that the spec does not declare
    #[arg(long)]
    pub strict_vars: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Scaffold prompts/, datasets/, a CI workflow and .pvault/config.json")]
pub struct InitArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Overwrite starter files that already exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Validate one prompt file or every prompt file under a directory")]
pub struct ValidateArgs {
    /// Prompt file or directory, relative to the repository root
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Validate files as of this git ref instead of the working tree
    #[arg(long = "ref", value_name = "REF")]
    pub reference: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    /// Policy selector (builtin:<name> or a command line)
    #[arg(long, value_name = "SELECTOR")]
    pub policy: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Render a prompt's messages with a variable binding")]
pub struct RenderArgs {
    /// Prompt file, relative to the repository root
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Variable binding as a JSON object
    #[arg(long, value_name = "JSON", conflicts_with = "vars_file")]
    pub vars: Option<String>,

    /// Read the variable binding from a JSON file
    #[arg(long, value_name = "PATH")]
    pub vars_file: Option<PathBuf>,

    /// Read the prompt as of this git ref
    #[arg(long = "ref", value_name = "REF")]
    pub reference: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(flatten)]
    pub safety: SafetyArgs,

    /// Policy selector (builtin:<name> or a command line)
    #[arg(long, value_name = "SELECTOR")]
    pub policy: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Run a prompt's inline tests and an optional JSONL dataset")]
pub struct EvalArgs {
    /// Prompt file, relative to the repository root
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Read the prompt as of this git ref
    #[arg(long = "ref", value_name = "REF")]
    pub reference: Option<String>,

    /// JSON Lines dataset of {vars, assert} rows
    #[arg(long, value_name = "PATH")]
    pub dataset: Option<PathBuf>,

    /// Write the JSON report here
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Write a JUnit XML report here
    #[arg(long, value_name = "PATH")]
    pub junit: Option<PathBuf>,

    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(flatten)]
    pub safety: SafetyArgs,

    /// Policy selector (builtin:<name> or a command line)
    #[arg(long, value_name = "SELECTOR")]
    pub policy: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show how a prompt file changed between two git refs")]
pub struct DiffArgs {
    /// Prompt file, relative to the repository root
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    #[arg(long, value_name = "REF")]
    pub ref1: String,

    #[arg(long, value_name = "REF")]
    pub ref2: String,

    #[command(flatten)]
    pub repo: RepoArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Resolve a git ref to a commit id")]
pub struct ResolveArgs {
    #[arg(value_name = "REF")]
    pub reference: String,

    #[command(flatten)]
    pub repo: RepoArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Package every prompt into a single JSON bundle")]
pub struct BundleArgs {
    /// Prompts directory (defaults to prompts_dir from the config)
    #[arg(long, value_name = "DIR")]
    pub prompts: Option<String>,

    /// Bundle output path
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BUNDLE_OUT)]
    pub out: PathBuf,

    /// Bundle prompts as of this git ref
    #[arg(long = "ref", value_name = "REF")]
    pub reference: Option<String>,

    #[command(flatten)]
    pub repo: RepoArgs,
}
