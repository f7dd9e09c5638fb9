//! End-to-end tests for the workflow service router.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use chainflow_agent::WorkflowState;
use chainflow_agent::llm::LlmError;
use chainflow_agent::server::workflow_router;
use chainflow_agent::workflow::WorkflowBuilder;
use common::ScriptedDriver;
use serde_json::{Value, json};

fn server_for(driver: &ScriptedDriver) -> TestServer {
    let state = WorkflowState {
        builder: Arc::new(WorkflowBuilder::new(
            Arc::new(driver.clone()),
            "gemini-2.0-flash-exp",
        )),
    };
    TestServer::new(workflow_router(state)).unwrap()
}

#[tokio::test]
async fn test_create_workflow() {
    let reply = json!({
        "agent_id": "agent_1",
        "tools": [
            {"id": "tool_1", "type": "deploy_erc20", "name": "Deploy ERC-20", "next_tools": ["tool_2"]},
            {"id": "tool_2", "type": "transfer", "name": "Transfer", "next_tools": []}
        ],
        "has_sequential_execution": false,
        "description": "Deploy a token then send some"
    });
    let driver = ScriptedDriver::generating(Ok(reply.to_string()));
    let server = server_for(&driver);

    let response = server
        .post("/create-workflow")
        .json(&json!({"user_query": "deploy a token and send 10 to 0xabc"}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["agent_id"], "agent_1");
    assert_eq!(body["tools"][0]["type"], "deploy_erc20");
    assert_eq!(body["tools"][0]["next_tools"], json!(["tool_2"]));
    // Flag is derived from the edges, not trusted from the model.
    assert_eq!(body["has_sequential_execution"], true);
    assert_eq!(body["raw_response"], reply.to_string());

    let prompts = driver.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("User Query: deploy a token and send 10 to 0xabc"));
}

#[tokio::test]
async fn test_create_workflow_invalid_json() {
    let driver = ScriptedDriver::generating(Ok("Sure! Here is your workflow".to_string()));
    let server = server_for(&driver);

    let response = server
        .post("/create-workflow")
        .json(&json!({"user_query": "anything"}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON response:")
    );
}

#[tokio::test]
async fn test_create_workflow_generation_error() {
    let driver = ScriptedDriver::generating(Err(LlmError::RateLimited("quota".into())));
    let server = server_for(&driver);

    let response = server
        .post("/create-workflow")
        .json(&json!({"user_query": "anything", "temperature": 0.1, "max_tokens": 500}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Gemini generation error:")
    );
}

#[tokio::test]
async fn test_available_tools() {
    let server = server_for(&ScriptedDriver::default());

    let response = server.get("/available-tools").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        body["tools"],
        json!(["transfer", "get_balance", "deploy_erc20", "deploy_erc721", "fetch_token_price"])
    );
}

#[tokio::test]
async fn test_health() {
    let server = server_for(&ScriptedDriver::default());

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Agent Workflow Builder");
    assert_eq!(body["ai_model"], "gemini-2.0-flash-exp");
}
