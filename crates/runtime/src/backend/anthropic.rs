//! Anthropic API decision backend.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    Backend, Decision, ModelError, ModelRequest, ToolRequest, ToolResult, Turn,
};
use wire::ToolDescriptor;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

// Claude Code OAuth constants
const CLAUDE_CODE_VERSION: &str = "2.1.2";
const OAUTH_BETA_HEADER: &str = "claude-code-20250219,oauth-2025-04-20,fine-grained-tool-streaming-2025-05-14,interleaved-thinking-2025-05-14";
const OAUTH_SYSTEM_PREFIX: &str = "You are Claude Code, Anthropic's official CLI for Claude.";

/// Authentication mode for Anthropic API.
#[derive(Debug, Clone)]
pub enum AnthropicAuth {
    /// Standard API key authentication.
    ApiKey(String),
    /// Claude Code OAuth token authentication.
    ClaudeCodeOauth(String),
}

impl std::fmt::Display for AnthropicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => write!(f, "api_key"),
            Self::ClaudeCodeOauth(_) => write!(f, "claude_code_oauth"),
        }
    }
}

impl AnthropicAuth {
    /// Classify a raw token by its prefix.
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.contains("sk-ant-oat") {
            Self::ClaudeCodeOauth(token)
        } else {
            Self::ApiKey(token)
        }
    }

    fn apply_headers(&self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Self::ApiKey(key) => req.header("x-api-key", key),
            Self::ClaudeCodeOauth(token) => req
                .header("anthropic-dangerous-direct-browser-access", "true")
                .header("Authorization", format!("Bearer {token}"))
                .header("anthropic-beta", OAUTH_BETA_HEADER)
                .header(
                    "user-agent",
                    format!("claude-cli/{CLAUDE_CODE_VERSION} (external, cli)"),
                )
                .header("x-app", "cli"),
        }
    }

    fn build_system(&self, system: Option<&str>) -> Option<ApiSystemPrompt> {
        match self {
            Self::ApiKey(_) => system.map(|s| ApiSystemPrompt::Simple(s.to_string())),
            Self::ClaudeCodeOauth(_) => {
                let mut blocks = vec![ApiSystemBlock {
                    block_type: "text",
                    text: OAUTH_SYSTEM_PREFIX.to_string(),
                    cache_control: ApiCacheControl {
                        control_type: "ephemeral",
                    },
                }];
                if let Some(s) = system {
                    blocks.push(ApiSystemBlock {
                        block_type: "text",
                        text: s.to_string(),
                        cache_control: ApiCacheControl {
                            control_type: "ephemeral",
                        },
                    });
                }
                Some(ApiSystemPrompt::Blocks(blocks))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<ApiSystemPrompt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiSystemPrompt {
    Simple(String),
    Blocks(Vec<ApiSystemBlock>),
}

#[derive(Debug, Serialize)]
struct ApiSystemBlock {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: String,
    cache_control: ApiCacheControl,
}

#[derive(Debug, Serialize)]
struct ApiCacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Unknown,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicBackendBuilder {
    auth: AnthropicAuth,
    model: String,
    max_tokens: u32,
    system: Option<String>,
}

impl AnthropicBackendBuilder {
    pub fn new(auth: AnthropicAuth, model: impl Into<String>) -> Self {
        Self {
            auth,
            model: model.into(),
            max_tokens: 4096,
            system: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn build(self) -> AnthropicBackend {
        AnthropicBackend {
            client: reqwest::Client::new(),
            auth: self.auth,
            model: self.model,
            max_tokens: self.max_tokens,
            system: self.system,
        }
    }
}

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: reqwest::Client,
    auth: AnthropicAuth,
    model: String,
    max_tokens: u32,
    system: Option<String>,
}

impl AnthropicBackend {
    pub fn builder(auth: AnthropicAuth, model: impl Into<String>) -> AnthropicBackendBuilder {
        AnthropicBackendBuilder::new(auth, model)
    }

    /// Convert the transcript into API messages.
    ///
    /// A tool round in the transcript interleaves call and result turns;
    /// the API wants the round as one assistant message of `tool_use`
    /// blocks followed by one user message of `tool_result` blocks, so
    /// consecutive tool turns are regrouped here.
    fn history_to_api(turns: &[Turn]) -> Vec<ApiMessage> {
        let mut messages = Vec::new();
        let mut iter = turns.iter().peekable();

        while let Some(turn) = iter.peek() {
            match turn {
                Turn::User { text } => {
                    messages.push(ApiMessage {
                        role: "user",
                        content: ApiContent::Text(text.clone()),
                    });
                    iter.next();
                }
                Turn::Assistant { text } => {
                    messages.push(ApiMessage {
                        role: "assistant",
                        content: ApiContent::Text(text.clone()),
                    });
                    iter.next();
                }
                Turn::ToolCall { .. } | Turn::ToolCallResult { .. } => {
                    let mut uses = Vec::new();
                    let mut results = Vec::new();
                    while let Some(turn) = iter.peek() {
                        match turn {
                            Turn::ToolCall {
                                id,
                                name,
                                arguments,
                            } => {
                                uses.push(ApiContentBlock::ToolUse {
                                    id: id.clone(),
                                    name: name.clone(),
                                    input: arguments.clone(),
                                });
                                iter.next();
                            }
                            Turn::ToolCallResult { id, result, .. } => {
                                let (content, is_error) = match result {
                                    ToolResult::Success { output } => (output.to_string(), false),
                                    ToolResult::Failure { error } => (error.clone(), true),
                                };
                                results.push(ApiContentBlock::ToolResult {
                                    tool_use_id: id.clone(),
                                    content,
                                    is_error,
                                });
                                iter.next();
                            }
                            _ => break,
                        }
                    }
                    messages.push(ApiMessage {
                        role: "assistant",
                        content: ApiContent::Blocks(uses),
                    });
                    messages.push(ApiMessage {
                        role: "user",
                        content: ApiContent::Blocks(results),
                    });
                }
            }
        }

        messages
    }

    fn tool_to_api(descriptor: &ToolDescriptor) -> ApiTool {
        ApiTool {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.parameters.clone(),
        }
    }

    fn response_to_decision(blocks: Vec<ApiResponseBlock>) -> Decision {
        let mut text = Vec::new();
        let mut requests = Vec::new();

        for block in blocks {
            match block {
                ApiResponseBlock::Text { text: t } => text.push(t),
                ApiResponseBlock::ToolUse { id, name, input } => {
                    requests.push(ToolRequest::new(id, name, input));
                }
                ApiResponseBlock::Unknown => {}
            }
        }

        if requests.is_empty() {
            Decision::Answer(text.join(""))
        } else {
            Decision::CallTools(requests)
        }
    }
}

impl std::fmt::Display for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anthropic({}, auth={})", self.model, self.auth)
    }
}

impl Backend for AnthropicBackend {
    async fn decide(&self, request: ModelRequest<'_>) -> Result<Decision, ModelError> {
        let api_request = ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: Self::history_to_api(request.history),
            system: self.auth.build_system(self.system.as_deref()),
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
        };

        let req = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .header("accept", "application/json");

        let req = self.auth.apply_headers(req);

        let response = req
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Ok(Self::response_to_decision(api_response.content))
    }
}
