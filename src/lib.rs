//! Chainflow Agent
//!
//! Natural-language front end for blockchain tool workflows, backed by the
//! Gemini API.
//!
//! # Architecture
//!
//! - **Agent service**: bounded tool-calling loop over HTTP-backed tools, with
//!   declared sequential ordering between tools
//! - **Workflow service**: single-shot synthesis of a workflow graph from a
//!   description
//!
//! # Modules
//!
//! - [`tools`]: tool registry, argument schemas, and HTTP invocation
//! - [`llm`]: model driver traits, the Gemini driver, and model fallback
//! - [`agent`]: tool plans, prompt rendering, and the conversation loop
//! - [`workflow`]: workflow graph generation
//! - [`server`]: axum routers for both services
//! - [`config`]: layered configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]
#![allow(clippy::format_push_string)]

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod telemetry;
pub mod tools;
pub mod workflow;

use std::sync::Arc;

use agent::AgentOrchestrator;
use tools::ToolRegistry;
use workflow::WorkflowBuilder;

/// Agent service state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registered tools, used for request validation and prompt rendering.
    pub registry: Arc<ToolRegistry>,
    /// Conversation loop.
    pub orchestrator: Arc<AgentOrchestrator>,
    /// Base URL of the tool backend, reported by `/health`.
    pub backend_url: String,
}

/// Workflow service state.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub builder: Arc<WorkflowBuilder>,
}
