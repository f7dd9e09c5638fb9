/// Tool types the workflow model may place in a graph.
pub const AVAILABLE_TOOLS: [&str; 5] = [
    "transfer",
    "get_balance",
    "deploy_erc20",
    "deploy_erc721",
    "fetch_token_price",
];

pub const SYSTEM_PROMPT: &str = r#"You are an AI that converts natural language descriptions of blockchain agent workflows into structured JSON for the Somnia blockchain.

Available tools:
- transfer: Transfer native or ERC-20 tokens between wallets
- get_balance: Fetch the native token balance for a wallet
- deploy_erc20: Deploy ERC-20 tokens
- deploy_erc721: Deploy ERC-721 NFT collections
- fetch_token_price: Get the current price of any token using AI-powered search

Your task is to analyze the user's request and create a workflow structure with:
1. An agent node (always present, id: "agent_1")
2. Tool nodes that the agent can use
3. Sequential connections when tools should execute in order
4. Parallel connections when tools are independent

Rules:
- The agent node always has id "agent_1" and type "agent"
- Each tool gets a unique id like "tool_1", "tool_2", etc.
- If tools should execute sequentially (one after another), set the next_tools field
- If tools are independent, they connect directly to the agent with empty next_tools
- Sequential execution examples: "deploy token then transfer", "check balance and then transfer"
- Parallel execution examples: "agent with multiple tools", "various tools available"
- IMPORTANT: Set has_sequential_execution to true if ANY tool has non-empty next_tools array
- IMPORTANT: Set has_sequential_execution to false ONLY if ALL tools have empty next_tools arrays

Return ONLY valid JSON matching this exact structure:
{
  "agent_id": "agent_1",
  "tools": [
    {
      "id": "tool_1",
      "type": "deploy_erc20",
      "name": "Token Deployment",
      "next_tools": ["tool_2"]
    },
    {
      "id": "tool_2",
      "type": "transfer",
      "name": "Transfer Tool",
      "next_tools": []
    }
  ],
  "has_sequential_execution": true,
  "description": "Brief description of the workflow"
}"#;

/// Full generation prompt for one user query.
pub fn render(user_query: &str) -> String {
    format!("{SYSTEM_PROMPT}\n\nUser Query: {user_query}\n\nGenerate the workflow JSON:")
}

/// Agent-service tool name for a workflow node type.
pub fn agent_tool_name(node_type: &str) -> &str {
    match node_type {
        "fetch_token_price" => "fetch_price",
        "stt_balance_fetch" => "get_balance",
        other => other,
    }
}
