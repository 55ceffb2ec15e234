//! Command implementations. Each `run_*` returns whether the command
//! succeeded; `main` turns `false` into exit status 1.
use crate::bundle::write_bundle;
use crate::cli::{
    BundleArgs, DiffArgs, EvalArgs, InitArgs, RenderArgs, RepoArgs, ResolveArgs, SafetyArgs,
    ValidateArgs,
};
use crate::config::{load_config, policy_selector, VaultConfig};
use crate::eval::{run_dataset, run_inline_tests, EvalOptions, EvalReport};
use crate::junit::junit_xml;
use crate::output::{print_json, write_json, write_text};
use crate::policy::{validate_spec, CaseKind, PolicyRunner, RenderContext};
use crate::render::join_messages;
use crate::safety::{render_safely, SafetyOptions};
use crate::scaffold::init_repo;
use crate::spec::{load_dataset_jsonl, LoadMode, PromptSpec};
use crate::store::{is_prompt_file, ref_label, GitStore, PromptStore};
use crate::util::{display_path, load_vars_file, parse_vars};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::{json, Map};
use std::fs;
use std::path::Path;

/// Store and configuration for one repository.
struct Session {
    store: GitStore,
    config: VaultConfig,
}

impl Session {
    fn open(repo: &RepoArgs) -> Result<Self> {
        let config = load_config(&repo.repo)?;
        tracing::debug!(
            repo = %repo.repo.display(),
            prompts_dir = %config.prompts_dir,
            "opened repository"
        );
        Ok(Self {
            store: GitStore::new(&repo.repo),
            config,
        })
    }

    fn policy(&self, cli: Option<&str>) -> Result<PolicyRunner> {
        let selector = policy_selector(cli, &self.config);
        let runner = PolicyRunner::from_selector(selector.as_deref()).context("load policy")?;
        if let Some(name) = runner.policy_name() {
            tracing::info!(policy = name, "policy loaded");
        }
        Ok(runner)
    }

    fn safety(&self, flags: SafetyArgs) -> SafetyOptions {
        self.config.safety.union(SafetyOptions {
            safe: flags.safe,
            redact: flags.redact,
            strict_vars: flags.strict_vars,
        })
    }

    fn load_spec(
        &self,
        prompt: &str,
        reference: Option<&str>,
        policy: &PolicyRunner,
    ) -> Result<PromptSpec> {
        let text = self
            .store
            .read_text(prompt, reference)
            .with_context(|| format!("read {prompt}"))?;
        validate_spec(&text, LoadMode::RequireTests, policy)
            .with_context(|| format!("load {prompt}"))
    }
}

pub fn run_init(args: InitArgs) -> Result<bool> {
    let root = &args.repo.repo;
    let summary = init_repo(root, args.force)?;
    for path in &summary.written {
        println!("wrote {}", display_path(path, Some(root)));
    }
    for path in &summary.kept {
        println!("kept {} (use --force to overwrite)", display_path(path, Some(root)));
    }
    Ok(true)
}

#[derive(Serialize)]
struct ValidateEntry {
    path: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run_validate(args: ValidateArgs) -> Result<bool> {
    let session = Session::open(&args.repo)?;
    let policy = session.policy(args.policy.as_deref())?;
    let reference = args.reference.as_deref();
    let files = gather_prompt_files(&session.store, &args.path, reference)?;
    if files.is_empty() {
        return Err(anyhow!(
            "no prompt files found under {} at {}",
            args.path,
            ref_label(reference)
        ));
    }

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let loaded = session
            .store
            .read_text(&path, reference)
            .map_err(Into::into)
            .and_then(|text| validate_spec(&text, LoadMode::RequireTests, &policy));
        let entry = match loaded {
            Ok(spec) => ValidateEntry {
                path,
                ok: true,
                name: Some(spec.name),
                error: None,
            },
            Err(err) => ValidateEntry {
                path,
                ok: false,
                name: None,
                error: Some(err.to_string()),
            },
        };
        if !args.json {
            match (&entry.name, &entry.error) {
                (Some(name), _) => println!("OK   {}  ({name})", entry.path),
                (_, Some(error)) => println!("FAIL {}  {error}", entry.path),
                _ => {}
            }
        }
        entries.push(entry);
    }

    let ok = entries.iter().all(|entry| entry.ok);
    if args.json {
        print_json(&json!({"ok": ok, "results": entries}))?;
    }
    Ok(ok)
}

pub fn run_render(args: RenderArgs) -> Result<bool> {
    let session = Session::open(&args.repo)?;
    let policy = session.policy(args.policy.as_deref())?;
    let reference = args.reference.as_deref();
    let spec = session.load_spec(&args.prompt, reference, &policy)?;
    let vars = match (&args.vars, &args.vars_file) {
        (Some(raw), _) => parse_vars(raw)?,
        (None, Some(path)) => load_vars_file(path)?,
        (None, None) => Map::new(),
    };

    let messages = render_safely(&spec, &vars, session.safety(args.safety))?;
    let context = RenderContext {
        prompt: spec.name.clone(),
        test: "render".to_string(),
        kind: CaseKind::Inline,
    };
    policy.check_render(&join_messages(&messages), &context)?;

    if args.json {
        print_json(&messages)?;
    } else {
        for message in &messages {
            println!("{}\n{}\n", message.role, message.content);
        }
    }
    Ok(true)
}

pub fn run_eval(args: EvalArgs) -> Result<bool> {
    let session = Session::open(&args.repo)?;
    let policy = session.policy(args.policy.as_deref())?;
    let reference = args.reference.as_deref();
    let spec = session.load_spec(&args.prompt, reference, &policy)?;
    let options = EvalOptions {
        safety: session.safety(args.safety),
        policy: &policy,
    };

    let (_, mut results) = run_inline_tests(&spec, options);
    if let Some(dataset) = &args.dataset {
        let text = fs::read_to_string(dataset)
            .with_context(|| format!("read dataset {}", dataset.display()))?;
        let rows = load_dataset_jsonl(&text)
            .with_context(|| format!("load dataset {}", dataset.display()))?;
        let (_, dataset_results) = run_dataset(&spec, &rows, options);
        results.extend(dataset_results);
    }
    let report = EvalReport::new(&spec, reference, results);

    if let Some(path) = &args.report {
        write_json(path, &report)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(path) = &args.junit {
        write_junit(path, &report)?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        print_json(&report)?;
    } else {
        for result in &report.results {
            if result.passed {
                println!("PASS {}", result.name);
            } else {
                println!(
                    "FAIL {}  {}",
                    result.name,
                    result.error.as_deref().unwrap_or_default()
                );
            }
        }
    }
    Ok(report.pass)
}

pub fn run_diff(args: DiffArgs) -> Result<bool> {
    let session = Session::open(&args.repo)?;
    let diff = session
        .store
        .diff(&args.prompt, &args.ref1, &args.ref2)
        .with_context(|| format!("diff {}", args.prompt))?;
    let same = diff.trim().is_empty();
    if args.json {
        print_json(&json!({"same": same, "diff": diff}))?;
    } else if same {
        println!("No differences");
    } else {
        print!("{diff}");
    }
    Ok(true)
}

pub fn run_resolve(args: ResolveArgs) -> Result<bool> {
    let session = Session::open(&args.repo)?;
    let sha = session.store.resolve_ref(&args.reference)?;
    if args.json {
        print_json(&json!({"ref": args.reference, "sha": sha}))?;
    } else {
        println!("{sha}");
    }
    Ok(true)
}

pub fn run_bundle(args: BundleArgs) -> Result<bool> {
    let session = Session::open(&args.repo)?;
    let prompts_dir = args
        .prompts
        .as_deref()
        .unwrap_or(session.config.prompts_dir.as_str());
    let bundle = write_bundle(
        &args.out,
        &session.store,
        prompts_dir,
        args.reference.as_deref(),
    )
    .context("write bundle")?;
    println!(
        "wrote bundle {} ({} prompts)",
        args.out.display(),
        bundle.prompts.len()
    );
    Ok(true)
}

/// A prompt file path is validated on its own; anything else is treated as
/// a directory and searched recursively.
fn gather_prompt_files(
    store: &GitStore,
    path: &str,
    reference: Option<&str>,
) -> Result<Vec<String>> {
    let single = match reference {
        None => store.root().join(path).is_file(),
        Some(_) => is_prompt_file(path),
    };
    if single {
        return Ok(vec![path.to_string()]);
    }
    let files = store
        .list_files(path, reference)
        .with_context(|| format!("list {path}"))?;
    Ok(files.into_iter().filter(|file| is_prompt_file(file)).collect())
}

fn write_junit(path: &Path, report: &EvalReport) -> Result<()> {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let suite = format!("pvault:{}", report.prompt);
    write_text(path, &junit_xml(&suite, &report.results, &timestamp))
}
