mod common;

use common::{find_in_path, stderr, stdout, stdout_json, Repo, HELLO_PROMPT};

const PROMPT_REL: &str = "prompts/hello_world.prompt.yml";

#[test]
fn init_scaffolds_a_repo_that_validates_and_evals() {
    let repo = Repo::scratch();
    let init = repo.pvault(&["init", "--repo", "."]);
    assert!(init.status.success(), "{}", stderr(&init));
    assert!(repo.root().join(".github/workflows/pvault.yml").is_file());
    assert!(repo.root().join(".pvault/config.json").is_file());
    assert!(repo.root().join("datasets").is_dir());

    let validate = repo.pvault(&["validate", "prompts"]);
    assert!(validate.status.success(), "{}", stderr(&validate));
    assert!(stdout(&validate).contains("(hello_world)"));

    let eval = repo.pvault(&["eval", PROMPT_REL, "--json"]);
    assert!(eval.status.success(), "{}", stderr(&eval));
    let report = stdout_json(&eval);
    assert_eq!(report["prompt"], "hello_world");
    assert_eq!(report["ref"], "WORKTREE");
    assert_eq!(report["pass"], true);
    assert_eq!(report["results"][0]["test"], "includes_name");
}

#[test]
fn init_keeps_edits_unless_forced() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, "name: edited\n");
    let init = repo.pvault(&["init"]);
    assert!(init.status.success(), "{}", stderr(&init));
    assert!(stdout(&init).contains("kept prompts/hello_world.prompt.yml"));
    assert_eq!(repo.read(PROMPT_REL), "name: edited\n");
}

#[test]
fn validate_reports_every_file_and_fails_on_any_error() {
    let repo = Repo::scratch();
    repo.write("prompts/a.prompt.yml", HELLO_PROMPT);
    repo.write(
        "prompts/b.prompt.json",
        r#"{"name": "b", "messages": [{"role": "robot", "content": "x"}], "tests": []}"#,
    );
    repo.write("prompts/readme.md", "not a prompt");

    let output = repo.pvault(&["validate", "prompts", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let payload = stdout_json(&output);
    assert_eq!(payload["ok"], false);
    let results = payload["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["path"], "prompts/a.prompt.yml");
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[1]["ok"], false);
    let error = results[1]["error"].as_str().expect("error");
    assert!(error.contains("messages[0]"), "{error}");
}

#[test]
fn validate_with_builtin_policy_rejects_reserved_names() {
    let repo = Repo::scratch();
    repo.write(
        "prompts/unsafe.prompt.yml",
        &HELLO_PROMPT.replace("name: hello_world", "name: unsafe_demo"),
    );
    let output = repo.pvault(&[
        "validate",
        "prompts/unsafe.prompt.yml",
        "--policy",
        "builtin:forbidden-phrases",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("unsafe_demo"), "{}", stdout(&output));
}

#[test]
fn render_prints_messages_and_names_missing_vars() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);

    let output = repo.pvault(&["render", PROMPT_REL, "--vars", r#"{"name": "Bo"}"#, "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let messages = stdout_json(&output);
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "Say hello to Bo.");

    let output = repo.pvault(&["render", PROMPT_REL]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Missing required vars: ['name']"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn render_safety_flags_block_or_redact_secrets() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);
    repo.write("vars.json", r#"{"name": "sk-abc12345678901234567890"}"#);

    let blocked = repo.pvault(&["render", PROMPT_REL, "--vars-file", "vars.json", "--safe"]);
    assert_eq!(blocked.status.code(), Some(1));
    assert!(stderr(&blocked).contains("openai_api_key"), "{}", stderr(&blocked));

    let redacted = repo.pvault(&[
        "render",
        PROMPT_REL,
        "--vars-file",
        "vars.json",
        "--safe",
        "--redact",
    ]);
    assert!(redacted.status.success(), "{}", stderr(&redacted));
    assert!(stdout(&redacted).contains("Say hello to [REDACTED]."));
}

#[test]
fn configured_safety_defaults_apply_without_flags() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);
    repo.write(
        ".pvault/config.json",
        r#"{"schema_version": 1, "safety": {"strict_vars": true}}"#,
    );
    let output = repo.pvault(&[
        "render",
        PROMPT_REL,
        "--vars",
        r#"{"name": "Ava", "extra": 1}"#,
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unexpected vars (strict mode): ['extra']"));
}

#[test]
fn eval_with_dataset_writes_reports() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);
    repo.write(
        "datasets/hello.jsonl",
        concat!(
            "{\"vars\": {\"name\": \"Bo\"}, \"assert\": {\"contains_all\": [\"hello\", \"bo\"]}}\n",
            "\n",
            "{\"vars\": {\"name\": \"Cy\"}, \"assert\": {\"not_contains\": [\"cy\"]}}\n",
        ),
    );
    let output = repo.pvault(&[
        "eval",
        PROMPT_REL,
        "--dataset",
        "datasets/hello.jsonl",
        "--report",
        "out/report.json",
        "--junit",
        "out/junit.xml",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("PASS includes_name"), "{text}");
    assert!(text.contains("PASS dataset_row_1"), "{text}");
    assert!(text.contains("FAIL dataset_row_2"), "{text}");

    let report: serde_json::Value =
        serde_json::from_str(&repo.read("out/report.json")).expect("report JSON");
    assert_eq!(report["pass"], false);
    assert_eq!(report["results"].as_array().map(Vec::len), Some(3));

    let junit = repo.read("out/junit.xml");
    assert!(junit.contains("<testsuite name=\"pvault:hello_world\" tests=\"3\" failures=\"1\""));
    assert!(junit.contains("<failure message=\"assertion failed\""));
}

#[test]
fn eval_rejects_malformed_dataset_line() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);
    repo.write(
        "datasets/bad.jsonl",
        concat!(
            "{\"vars\": {\"name\": \"A\"}, \"assert\": {\"contains_any\": [\"a\"]}}\n",
            "{not json\n",
            "{\"vars\": {\"name\": \"C\"}, \"assert\": {\"contains_any\": [\"c\"]}}\n",
        ),
    );
    let output = repo.pvault(&["eval", PROMPT_REL, "--dataset", "datasets/bad.jsonl"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Invalid dataset on line 2"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn eval_with_process_policy_fails_flagged_cases() {
    if find_in_path("sh").is_none() {
        return;
    }
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);
    repo.write(
        "policy.sh",
        "#!/bin/sh\nif grep -q check_render; then echo '{\"findings\": [\"no greetings allowed\"]}'; else echo '{}'; fi\n",
    );
    let output = repo.pvault(&["eval", PROMPT_REL, "--json", "--policy", "sh policy.sh"]);
    assert_eq!(output.status.code(), Some(1));
    let report = stdout_json(&output);
    assert_eq!(report["results"][0]["pass"], false);
    assert_eq!(report["results"][0]["error"], "no greetings allowed");
}

#[test]
fn unknown_policy_is_a_usage_error() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);
    let output = repo.pvault(&["eval", PROMPT_REL, "--policy", "builtin:nope"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown builtin policy"), "{}", stderr(&output));
}

#[test]
fn bundle_collects_worktree_prompts() {
    let repo = Repo::scratch();
    repo.write(PROMPT_REL, HELLO_PROMPT);
    repo.write(
        "prompts/system_only.prompt.json",
        r#"{"name": "system_only", "messages": [{"role": "system", "content": "Be brief."}]}"#,
    );
    let output = repo.pvault(&["bundle", "--out", "out/bundle.json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let bundle: serde_json::Value =
        serde_json::from_str(&repo.read("out/bundle.json")).expect("bundle JSON");
    assert_eq!(bundle["bundle_version"], "1.0");
    assert_eq!(bundle["ref"], "WORKTREE");
    let paths: Vec<&str> = bundle["prompts"]
        .as_array()
        .expect("prompts")
        .iter()
        .filter_map(|prompt| prompt["path"].as_str())
        .collect();
    assert_eq!(
        paths,
        vec!["prompts/hello_world.prompt.yml", "prompts/system_only.prompt.json"]
    );
}
