use serde::Serialize;

use super::{AgentError, ToolConnection};
use crate::tools::ToolRegistry;

/// Forced-successor edges, at most one per source tool.
///
/// Edges keep the position where their source was first declared; a later
/// declaration for the same source replaces the target in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowMap {
    edges: Vec<(String, String)>,
}

impl FlowMap {
    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        match self.edges.iter_mut().find(|(f, _)| *f == from) {
            Some(edge) => edge.1 = to,
            None => self.edges.push((from, to)),
        }
    }

    /// Forced successor of `tool`, if any.
    pub fn next(&self, tool: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|(f, _)| f == tool)
            .map(|(_, t)| t.as_str())
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(f, t)| (f.as_str(), t.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}

/// Tools exposed for one run, plus their forced ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPlan {
    unique_tools: Vec<String>,
    flow: FlowMap,
}

impl ToolPlan {
    /// Derive the plan from an ordered connection list. Tools are listed in
    /// order of first appearance, as source or target.
    pub fn from_connections(connections: &[ToolConnection]) -> Self {
        let mut plan = Self::default();
        for conn in connections {
            plan.add_tool(&conn.tool);
            if let Some(next) = &conn.next_tool {
                plan.add_tool(next);
                plan.flow.insert(conn.tool.as_str(), next.as_str());
            }
        }
        plan
    }

    fn add_tool(&mut self, name: &str) {
        if !self.unique_tools.iter().any(|t| t == name) {
            self.unique_tools.push(name.to_string());
        }
    }

    pub fn unique_tools(&self) -> &[String] {
        &self.unique_tools
    }

    pub fn flow(&self) -> &FlowMap {
        &self.flow
    }

    pub fn into_parts(self) -> (Vec<String>, FlowMap) {
        (self.unique_tools, self.flow)
    }

    /// Reject the plan if it names a tool the registry does not know.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownTool`] for the first unregistered name.
    pub fn validate(&self, registry: &ToolRegistry) -> Result<(), AgentError> {
        match self.unique_tools.iter().find(|t| !registry.contains(t)) {
            Some(unknown) => Err(AgentError::UnknownTool(unknown.clone())),
            None => Ok(()),
        }
    }
}
