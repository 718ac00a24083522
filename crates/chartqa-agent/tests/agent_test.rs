//! Tabular Agent Integration Tests
//!
//! The agent runs against a scripted LLM, so every reply and every prompt
//! it sees is fixed by the test.
//!
//! Author: hephaex@gmail.com

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chartqa_agent::{AgentSettings, Cell, TabularAgent, TabularService, Table, ITERATION_LIMIT_ANSWER};
use chartqa_core::{AgentConfig, AnswerMode, AnswerService, ChartQaError};
use chartqa_llm::MockLlmClient;

const GAPMINDER: &str = "\
country,income,health,population,region
Norway,64304,81.6,5210967,europe_central_asia
Japan,36162,83.5,126573481,east_asia_pacific
Chad,2191,57.2,14037472,sub_saharan_africa
Brazil,14833,75.6,207847528,america
Germany,44053,81.1,80688545,europe_central_asia
";

fn table() -> Arc<Table> {
    Arc::new(Table::from_reader(GAPMINDER.as_bytes()).unwrap())
}

fn agent(replies: Vec<&str>) -> (TabularAgent, Arc<MockLlmClient>) {
    let llm = Arc::new(MockLlmClient::new(
        replies.into_iter().map(str::to_string).collect(),
    ));
    let agent = TabularAgent::new(llm.clone(), table(), AgentSettings::default());
    (agent, llm)
}

#[tokio::test]
async fn test_finish_immediately() {
    let (agent, llm) = agent(vec![r#"{"thought": "preview is enough", "answer": "5 countries"}"#]);

    let answer = agent.run("How many countries?").await.unwrap();
    assert_eq!(answer, "5 countries");
    assert_eq!(llm.calls(), 1);

    let prompt = &llm.prompts()[0];
    assert!(prompt.contains("Question: How many countries?"));
    assert!(prompt.contains("country, income, health, population, region"));
    assert!(prompt.contains("- aggregate:"));
}

#[tokio::test]
async fn test_tool_call_then_finish() {
    let (agent, llm) = agent(vec![
        r#"{"thought": "find the highest income", "action": {"calls": [{"tool": "sort", "args": {"column": "income", "order": "desc", "limit": 1}}]}}"#,
        r#"{"thought": "Norway is first", "answer": "Norway has the highest income."}"#,
    ]);

    let answer = agent.run("Which country is richest?").await.unwrap();
    assert_eq!(answer, "Norway has the highest income.");

    let second = &llm.prompts()[1];
    assert!(second.contains("Previous steps:"));
    assert!(second.contains("Thought: find the highest income"));
    assert!(second.contains("Observation [sort]: | country | income"));
    assert!(second.contains("| Norway | 64304 |"));
}

#[tokio::test]
async fn test_parallel_calls_all_observed() {
    let (agent, llm) = agent(vec![
        r#"{"thought": "compare", "action": {"calls": [
            {"tool": "aggregate", "args": {"column": "health", "function": "max"}},
            {"tool": "aggregate", "args": {"column": "health", "function": "min"}}
        ]}}"#,
        r#"{"thought": "done", "answer": "57.2 to 83.5"}"#,
    ]);

    assert_eq!(agent.run("Range of health?").await.unwrap(), "57.2 to 83.5");
    let second = &llm.prompts()[1];
    assert!(second.contains("max(health) = 83.5 over 5 rows"));
    assert!(second.contains("min(health) = 57.2 over 5 rows"));
}

#[tokio::test]
async fn test_tool_errors_become_observations() {
    let (agent, llm) = agent(vec![
        r#"{"thought": "try gdp", "action": {"calls": [{"tool": "aggregate", "args": {"column": "gdp", "function": "sum"}}]}}"#,
        r#"{"thought": "no gdp column", "answer": "The table has no GDP column."}"#,
    ]);

    let answer = agent.run("Total GDP?").await.unwrap();
    assert_eq!(answer, "The table has no GDP column.");
    assert!(llm.prompts()[1].contains("Observation [aggregate]: ERROR Data error: Unknown column 'gdp'"));
}

#[tokio::test]
async fn test_slow_tool_call_times_out() {
    let rows = (0..400_000u64)
        .map(|i| {
            vec![
                Cell::Text(format!("k{}", i % 50_000)),
                Cell::Number(((i * 7919) % 100_003) as f64),
            ]
        })
        .collect();
    let big = Arc::new(Table::new(vec!["k".to_string(), "v".to_string()], rows));

    let llm = Arc::new(MockLlmClient::new(vec![
        r#"{"thought": "median per key", "action": {"calls": [{"tool": "group_by", "args": {"by": "k", "column": "v", "function": "median"}}]}}"#.to_string(),
        r#"{"thought": "too slow", "answer": "gave up"}"#.to_string(),
    ]));
    let settings = AgentSettings {
        tool_timeout: Duration::from_millis(1),
        ..AgentSettings::default()
    };
    let agent = TabularAgent::new(llm.clone(), big, settings);

    assert_eq!(agent.run("Median per key?").await.unwrap(), "gave up");
    assert!(llm.prompts()[1].contains("Observation [group_by]: ERROR timed out"));
}

#[tokio::test]
async fn test_unparseable_reply_is_fed_back() {
    let (agent, llm) = agent(vec![
        "Norway, obviously.",
        r#"{"thought": "retry in JSON", "answer": "Norway"}"#,
    ]);

    assert_eq!(agent.run("Richest?").await.unwrap(), "Norway");
    assert!(llm.prompts()[1].contains("Your reply could not be used"));
    assert!(llm.prompts()[1].contains("Norway, obviously."));
}

#[tokio::test]
async fn test_iteration_limit_returns_stop_message() {
    let llm = Arc::new(MockLlmClient::always(
        r#"{"thought": "look again", "action": {"calls": [{"tool": "head"}]}}"#,
    ));
    let settings = AgentSettings {
        max_iterations: 3,
        ..AgentSettings::default()
    };
    let agent = TabularAgent::new(llm.clone(), table(), settings);

    let answer = agent.run("Loop forever?").await.unwrap();
    assert_eq!(answer, ITERATION_LIMIT_ANSWER);
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn test_llm_failure_aborts_run() {
    let llm = Arc::new(MockLlmClient::failing("rate limited"));
    let agent = TabularAgent::new(llm, table(), AgentSettings::default());

    let err = agent.run("anything").await.unwrap_err();
    assert!(matches!(err, ChartQaError::LlmError(msg) if msg == "rate limited"));
}

#[tokio::test]
async fn test_service_loads_data_file_per_question() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(GAPMINDER.as_bytes()).unwrap();

    let config = AgentConfig {
        data_path: file.path().to_path_buf(),
        ..AgentConfig::default()
    };
    let llm = Arc::new(MockLlmClient::always(r#"{"thought": "t", "answer": "Chad"}"#));
    let service = TabularService::new(llm.clone(), &config);

    assert_eq!(service.mode(), AnswerMode::Tabular);
    assert_eq!(service.answer("Poorest?").await.unwrap(), "Chad");
    assert_eq!(service.answer("Poorest again?").await.unwrap(), "Chad");
    assert_eq!(llm.calls(), 2);
    assert!(llm.prompts()[1].contains("Question: Poorest again?"));
}

#[tokio::test]
async fn test_service_missing_data_file_is_data_error() {
    let config = AgentConfig {
        data_path: "/nonexistent/gapminder.csv".into(),
        ..AgentConfig::default()
    };
    let llm = Arc::new(MockLlmClient::always("unused"));
    let service = TabularService::new(llm.clone(), &config);

    let err = service.answer("Poorest?").await.unwrap_err();
    assert!(matches!(err, ChartQaError::DataError(_)));
    assert_eq!(llm.calls(), 0);
}
