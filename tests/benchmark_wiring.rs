//! Offline end-to-end tests: model provisioning, tool assembly and a
//! scripted benchmark run over a dataset written to a temp dir.

use std::sync::Arc;

use clap::Parser;

use owl_gaia::agents::AgentParams;
use owl_gaia::benchmark::{GaiaBenchmark, LevelFilter, RunReport, RunRequest};
use owl_gaia::cli::{assemble_tools, build_agent_params, run_with_cli, Cli};
use owl_gaia::config::{Credentials, RunSettings};
use owl_gaia::llm::ScriptedProvider;
use owl_gaia::models::{ModelConfig, ModelFactory, ModelHandle, ModelPlatform, ModelSet, ModelType};
use owl_gaia::toolkits::ToolSet;

fn scripted(responses: &[&str]) -> ModelHandle {
    ModelHandle::new(
        ModelPlatform::OpenAi,
        ModelType::Gpt4o,
        ModelConfig::chatgpt(0.0, 1.0),
        None,
        Arc::new(ScriptedProvider::new(responses.iter().copied())),
    )
}

fn write_dataset(root: &std::path::Path) {
    let valid = root.join("2023").join("validation");
    let test = root.join("2023").join("test");
    std::fs::create_dir_all(&valid).expect("mkdir");
    std::fs::create_dir_all(&test).expect("mkdir");
    std::fs::write(
        valid.join("metadata.jsonl"),
        [
            r#"{"task_id": "a", "Question": "What is 6 times 7?", "Level": 1, "Final answer": "42", "file_name": ""}"#,
            r#"{"task_id": "b", "Question": "Which planet is red?", "Level": 1, "Final answer": "Mars", "file_name": ""}"#,
            r#"{"task_id": "c", "Question": "Hard one", "Level": 3, "Final answer": "x", "file_name": ""}"#,
        ]
        .join("\n"),
    )
    .expect("write");
    std::fs::write(
        test.join("metadata.jsonl"),
        r#"{"task_id": "t", "Question": "?", "Level": 1, "Final answer": "?", "file_name": ""}"#,
    )
    .expect("write");
}

#[test]
fn test_provisioned_handles_and_bundles() {
    let credentials = Credentials::with_openai_key("sk-test-0000000000");
    let factory = ModelFactory::new(credentials.clone());
    let models = ModelSet::provision(&RunSettings::default(), &factory).expect("provision");

    assert_eq!(models.user.platform(), ModelPlatform::Vllm);
    assert_eq!(models.user.model_type().as_str(), "Qwen/Qwen2.5-VL-7B-Instruct");
    assert_eq!(models.user.url(), Some("http://localhost:8964/v1"));
    assert_eq!(models.user.config().temperature, Some(0.0));
    assert_eq!(models.user.config().top_p, Some(1.0));
    for (_, handle) in models.roles().into_iter().skip(1) {
        assert_eq!(handle.platform(), ModelPlatform::OpenAi);
        assert_eq!(handle.model_type(), &ModelType::Gpt4o);
    }

    let tools = assemble_tools(&models, &credentials).expect("tools");
    assert_eq!(tools.len(), 13);
    let (user, assistant) = build_agent_params(&models, tools);
    assert!(user.tools.is_none());
    assert_eq!(assistant.tool_count(), 13);
}

#[test]
fn test_missing_openai_key_blocks_provisioning() {
    let factory = ModelFactory::new(Credentials::default());
    assert!(ModelSet::provision(&RunSettings::default(), &factory).is_err());
}

#[tokio::test]
async fn test_scripted_run_reports_accuracy() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_dataset(dir.path());
    let save_to = dir.path().join("results").join("run.json");
    let benchmark = GaiaBenchmark::new(dir.path(), save_to.clone())
        .expect("benchmark")
        .with_cache_dir(dir.path().join("tmp"));
    assert_eq!(benchmark.valid().len(), 3);
    assert_eq!(benchmark.test().len(), 1);

    // Both level-1 tasks run; the user finishes immediately each time.
    let user = scripted(&["TASK_DONE", "TASK_DONE"]);
    let assistant = scripted(&["FINAL ANSWER: 42", "FINAL ANSWER: Venus"]);
    let mut request = RunRequest::new(AgentParams::user(user), AgentParams::assistant(assistant, ToolSet::new()));
    request.level = LevelFilter::Level(1);
    request.idx = Vec::new();

    let summary = benchmark.run(request).await.expect("run");
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.total, 2);
    assert!((summary.accuracy - 0.5).abs() < f64::EPSILON);

    let report = RunReport::load(&save_to).expect("saved");
    assert_eq!(report.results.len(), 2);
    assert!(report.results[0].score);
    assert_eq!(report.results[1].model_answer, "Venus");
}

#[tokio::test]
async fn test_run_without_openai_key_never_runs_benchmark() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_dataset(dir.path());
    let save_to = dir.path().join("results").join("run.json");
    let data_dir = dir.path().to_string_lossy().into_owned();
    let save_to_arg = save_to.to_string_lossy().into_owned();
    let cache_dir = dir.path().join("tmp").to_string_lossy().into_owned();

    // Empty counts as unset, and a present variable is not overridden by `.env`.
    std::env::set_var("OPENAI_API_KEY", "");

    let cli = Cli::try_parse_from([
        "owl-gaia",
        "--data-dir",
        data_dir.as_str(),
        "--save-to",
        save_to_arg.as_str(),
        "--cache-dir",
        cache_dir.as_str(),
    ])
    .expect("parse");
    let err = run_with_cli(cli).await.expect_err("run must fail without a key");

    let chain = format!("{:#}", err);
    assert!(chain.contains("Failed to provision models"), "unexpected error: {}", chain);
    assert!(chain.contains("OPENAI_API_KEY"), "unexpected error: {}", chain);
    assert!(!save_to.exists());
}
