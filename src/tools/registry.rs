use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

use super::schema::{ParamSpec, ParamType, ParameterSchema};
use super::{HttpMethod, ToolDefinition};

/// Registry construction errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    Duplicate(String),

    #[error("tool '{tool}' endpoint uses placeholder '{{{placeholder}}}' that is not a required parameter")]
    UnboundPlaceholder { tool: String, placeholder: String },
}

/// Read-only mapping from tool name to [`ToolDefinition`].
///
/// Built once at startup and shared through `Arc`; lookups never mutate.
#[derive(Clone)]
pub struct ToolRegistry {
    // registration order is kept for listing and prompt rendering
    tools: Arc<Vec<ToolDefinition>>,
    index: Arc<HashMap<String, usize>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .finish()
    }
}

impl ToolRegistry {
    /// Build a registry from explicit definitions.
    ///
    /// Every endpoint placeholder must name a required parameter, so that a
    /// validated argument set can always resolve the URL.
    pub fn from_definitions(defs: Vec<ToolDefinition>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(defs.len());

        for (pos, def) in defs.iter().enumerate() {
            if index.insert(def.name.clone(), pos).is_some() {
                return Err(RegistryError::Duplicate(def.name.clone()));
            }
            for placeholder in def.placeholders() {
                let bound = def
                    .parameters
                    .get(placeholder)
                    .is_some_and(|p| p.required);
                if !bound {
                    return Err(RegistryError::UnboundPlaceholder {
                        tool: def.name.clone(),
                        placeholder: placeholder.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            tools: Arc::new(defs),
            index: Arc::new(index),
        })
    }

    /// The platform tool set, with endpoints on `backend_url`.
    pub fn builtin(backend_url: &str) -> Result<Self, RegistryError> {
        Self::from_definitions(builtin_definitions(backend_url.trim_end_matches('/')))
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Gemini function declarations for the named tools; unknown names are skipped.
    pub fn function_declarations<S: AsRef<str>>(&self, names: &[S]) -> Vec<Value> {
        names
            .iter()
            .filter_map(|n| self.lookup(n.as_ref()))
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters.to_json_schema(true),
                })
            })
            .collect()
    }
}

fn tool(
    name: &str,
    description: &str,
    method: HttpMethod,
    endpoint: String,
    params: Vec<ParamSpec>,
) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: ParameterSchema::new(params),
        endpoint,
        method,
    }
}

#[allow(clippy::too_many_lines)]
fn builtin_definitions(base: &str) -> Vec<ToolDefinition> {
    use HttpMethod::{Get, Post};
    use ParamType::{Number, String};

    let private_key = |who: &str| ParamSpec::required("privateKey", String, who).secret();

    vec![
        tool(
            "transfer",
            "Transfer tokens from one address to another. Requires privateKey, toAddress, amount, and optionally tokenId for ERC20 transfers (omit for native ETH).",
            Post,
            format!("{base}/transfer"),
            vec![
                private_key("Private key of the sender wallet"),
                ParamSpec::required("toAddress", String, "Recipient wallet address"),
                ParamSpec::required("amount", String, "Amount of tokens to transfer"),
                ParamSpec::optional(
                    "tokenId",
                    String,
                    "Token ID from factory (optional, for ERC20 transfers only, omit for ETH)",
                ),
            ],
        ),
        tool(
            "get_balance",
            "Get ETH balance of a wallet address. Requires only the wallet address.",
            Get,
            format!("{base}/transfer/balance/{{address}}"),
            vec![ParamSpec::required(
                "address",
                String,
                "Wallet address to check balance",
            )],
        ),
        tool(
            "deploy_erc20",
            "Deploy a new ERC-20 token via the TokenFactory contract. Returns a tokenId. Requires privateKey, name, symbol, and initialSupply. Optional: decimals (default 18).",
            Post,
            format!("{base}/token/deploy"),
            vec![
                private_key("Private key of the deployer wallet"),
                ParamSpec::required("name", String, "Token name"),
                ParamSpec::required("symbol", String, "Token symbol"),
                ParamSpec::required("initialSupply", String, "Initial token supply"),
                ParamSpec::optional("decimals", Number, "Token decimals (optional, default 18)"),
            ],
        ),
        tool(
            "deploy_erc721",
            "Deploy a new ERC-721 NFT collection via the NFTFactory contract. Requires privateKey, name, symbol, and baseURI.",
            Post,
            format!("{base}/nft/deploy-collection"),
            vec![
                private_key("Private key of the deployer wallet"),
                ParamSpec::required("name", String, "NFT collection name"),
                ParamSpec::required("symbol", String, "NFT collection symbol"),
                ParamSpec::required(
                    "baseURI",
                    String,
                    "Base URI for token metadata (e.g., ipfs://...)",
                ),
            ],
        ),
        tool(
            "fetch_price",
            "Fetch the current price of any cryptocurrency. Supports queries like 'bitcoin', 'ethereum price', 'btc eth sol'. Returns real-time prices with 24h change, market cap, and volume data. If vsCurrency is not provided, it defaults to 'usd'.",
            Post,
            format!("{base}/price/token"),
            vec![
                ParamSpec::required(
                    "query",
                    String,
                    "Query string for cryptocurrency (e.g., 'bitcoin', 'ethereum price', 'btc eth sol')",
                ),
                ParamSpec::optional(
                    "vsCurrency",
                    String,
                    "Currency to show price in (e.g., 'usd', 'eur', 'inr'). Defaults to 'usd' if not provided.",
                ),
            ],
        ),
        tool(
            "get_token_info",
            "Get detailed information about a deployed token using its tokenId. Returns name, symbol, decimals, total supply, and creator.",
            Get,
            format!("{base}/token/info/{{tokenId}}"),
            vec![ParamSpec::required(
                "tokenId",
                String,
                "The token ID returned from deployment",
            )],
        ),
        tool(
            "get_token_balance",
            "Get token balance for a specific address. Requires tokenId and ownerAddress.",
            Get,
            format!("{base}/token/balance/{{tokenId}}/{{ownerAddress}}"),
            vec![
                ParamSpec::required("tokenId", String, "The token ID"),
                ParamSpec::required("ownerAddress", String, "Wallet address to check balance"),
            ],
        ),
        tool(
            "mint_nft",
            "Mint a new NFT in an existing collection. Requires privateKey, collectionAddress, and toAddress.",
            Post,
            format!("{base}/nft/mint"),
            vec![
                private_key("Private key of the collection creator"),
                ParamSpec::required(
                    "collectionAddress",
                    String,
                    "NFT collection contract address",
                ),
                ParamSpec::required("toAddress", String, "Recipient wallet address"),
            ],
        ),
        tool(
            "get_nft_info",
            "Get information about a specific NFT. Requires collectionAddress and tokenId.",
            Get,
            format!("{base}/nft/info/{{collectionAddress}}/{{tokenId}}"),
            vec![
                ParamSpec::required(
                    "collectionAddress",
                    String,
                    "NFT collection contract address",
                ),
                ParamSpec::required("tokenId", String, "Token ID within the collection"),
            ],
        ),
    ]
}
