//! 채팅 모듈 - 검색 결과를 컨텍스트로 하는 언어 모델 응답 생성
//!
//! 검색 엔진과의 접점은 `SearchResult` 목록뿐입니다.
//! 프롬프트 조립 → 대화 이력(최근 10개) → OpenAI 호환 chat completions 호출 순서입니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let provider = OpenAiChat::new(config)?;
//! let answer = answer_question(&service, &provider, "How do I create a work order?", &[]).await?;
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::knowledge::SearchResult;
use crate::service::KnowledgeService;

/// 컨텍스트로 사용할 검색 결과 수
pub const CONTEXT_DOCUMENTS: usize = 3;
/// 모델에 전달할 최근 대화 수
pub const HISTORY_TURNS: usize = 10;

// ============================================================================
// Types
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 대화 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 답변에 인용된 출처
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// 채팅 응답
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub response: String,
    pub sources: Vec<Source>,
}

// ============================================================================
// ChatProvider Trait
// ============================================================================

/// 언어 모델 프로바이더 트레이트
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// 메시지 목록에 대한 응답 텍스트 생성
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// 프로바이더 이름 (모델명)
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Chat
// ============================================================================

/// OpenAI 호환 chat completions 클라이언트
pub struct OpenAiChat {
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// 설정으로 생성 (API 키 필수)
    pub fn new(config: ChatConfig) -> Result<Self> {
        let api_key = match config.api_key {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => bail!(
                "API key not found. Set OPENAI_API_KEY environment variable.\n\
                 Get your API key at: https://platform.openai.com/api-keys"
            ),
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            model: config.model,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 에러 응답
#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to call chat completions")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OpenAiError>(&body) {
                bail!("OpenAI API error ({}): {}", status, error.error.message);
            }
            bail!("OpenAI API error ({}): {}", status, body);
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&body).context("Failed to parse chat completion response")?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .context("Chat completion returned no content")
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Prompt Assembly
// ============================================================================

/// 검색 결과를 포함한 시스템 프롬프트 생성
pub fn build_system_prompt(results: &[SearchResult]) -> String {
    let mut prompt = String::from(
        "You are a helpful support assistant for the Eptura knowledge base. \
         Answer questions using the documentation excerpts below. \
         If the documentation does not cover the question, say so instead of guessing, \
         and point the user to the most relevant page when possible.\n\n",
    );

    if results.is_empty() {
        prompt.push_str("No documentation matched this question.\n");
        return prompt;
    }

    prompt.push_str("Relevant documentation:\n");
    for (i, result) in results.iter().enumerate() {
        prompt.push_str(&format!(
            "\n[{}] {}\nURL: {}\n{}\n",
            i + 1,
            result.document.title,
            result.document.url,
            result.excerpt
        ));
    }

    prompt
}

/// 모델에 보낼 메시지 목록 조립
///
/// 시스템 프롬프트 → 최근 `HISTORY_TURNS`개의 대화 → 새 사용자 메시지 순서입니다.
pub fn assemble_messages(
    system_prompt: String,
    conversation: &[ChatMessage],
    message: &str,
) -> Vec<ChatMessage> {
    let recent = &conversation[conversation.len().saturating_sub(HISTORY_TURNS)..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(recent.iter().cloned());
    messages.push(ChatMessage::user(message));
    messages
}

/// 질문에 대한 답변 생성
///
/// 상위 3개 검색 결과를 컨텍스트로 사용하고 그 문서들을 출처로 반환합니다.
pub async fn answer_question(
    service: &KnowledgeService,
    provider: &dyn ChatProvider,
    message: &str,
    conversation: &[ChatMessage],
) -> Result<ChatAnswer> {
    let results = service
        .search(message, CONTEXT_DOCUMENTS)
        .context("Knowledge search failed")?;

    let messages = assemble_messages(build_system_prompt(&results), conversation, message);
    tracing::debug!(
        "Sending {} messages to {} ({} context documents)",
        messages.len(),
        provider.name(),
        results.len()
    );

    let response = provider.complete(&messages).await?;

    let sources = results
        .into_iter()
        .map(|result| Source {
            title: result.document.title,
            url: result.document.url,
        })
        .collect();

    Ok(ChatAnswer { response, sources })
}

// ============================================================================
// Tests
// ============================================================================
