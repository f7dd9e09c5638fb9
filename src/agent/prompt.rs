//! System prompt rendering.

use std::fmt::Write as _;

use super::{ToolConnection, ToolPlan};
use crate::tools::ToolRegistry;

const PREAMBLE: &str = "You are an AI agent for the Somnia blockchain platform. \
You help users perform blockchain operations using the tools available to you.

AVAILABLE TOOLS:
";

const SEQUENTIAL_HEADER: &str = "\n\nTOOL EXECUTION FLOW:\n\
Some tools are connected in sequence. You MUST execute them in the specified order:\n";

const SEQUENTIAL_RULES: &str = "
SEQUENTIAL EXECUTION INSTRUCTIONS - CRITICAL:
1. When tools are connected sequentially, you MUST execute ALL tools in the chain
2. After completing one tool, IMMEDIATELY proceed to call the next tool in the sequence
3. DO NOT wait for user confirmation between sequential tool calls
4. Execute all sequential tools in ONE conversation turn
5. Only provide a final summary after ALL sequential tools have been completed
6. If you have all the required parameters for the entire sequence, execute all tools immediately
";

const STANDALONE_RULES: &str = "
INSTRUCTIONS:
1. You can perform any of the available operations based on user requests
2. Ask for required parameters if not provided
3. Execute the appropriate tool based on user needs
4. Provide clear results and next steps
";

const CLOSING_RULES: &str = "
IMPORTANT RULES:
- Only use the tools that are available to you
- If ALL required parameters are provided (either in the user message or in the context), execute the tool IMMEDIATELY without asking for confirmation
- ONLY ask for parameters that are missing or unclear - DO NOT ask for confirmation if you have all required information
- If a privateKey is needed and provided in the context, use it automatically
- Be conversational and helpful
- Provide transaction hashes and explorer links when available
- Explain what each operation does in simple terms
- For sequential executions, complete the ENTIRE chain before responding
- DO NOT ask \"Do you want to proceed?\" if you have all the required parameters
";

/// Renders the agent system prompt from a [`ToolPlan`].
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn build(&self, connections: &[ToolConnection]) -> String {
        self.build_for_plan(&ToolPlan::from_connections(connections))
    }

    /// Deterministic: the same plan always renders the same prompt.
    pub fn build_for_plan(&self, plan: &ToolPlan) -> String {
        let mut prompt = String::from(PREAMBLE);

        for name in plan.unique_tools() {
            if let Some(def) = self.registry.lookup(name) {
                let _ = writeln!(prompt, "\n- {name}: {}", def.description);
            }
        }

        if plan.flow().is_empty() {
            prompt.push_str(STANDALONE_RULES);
        } else {
            prompt.push_str(SEQUENTIAL_HEADER);
            for (from, to) in plan.flow().edges() {
                let _ = writeln!(prompt, "- After {from} completes, YOU MUST IMMEDIATELY call {to}");
            }
            prompt.push_str(SEQUENTIAL_RULES);
        }

        prompt.push_str(CLOSING_RULES);
        prompt
    }
}
