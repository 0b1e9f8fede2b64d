//! Natural-language-to-code gateway and its OpenRouter client.
//!
//! Every call walks the configured model list: rate limits, error statuses,
//! transport failures and unusable answers all move on to the next model.
//! Only when every model fails does the call fail.

use crate::config::GatewayConfig;
use crate::error::{StudioError, StudioResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use webcrafter_core::partition::{inline_for_refinement, validate_prompt};
use webcrafter_core::{finish_refinement, partition_response, CodeBundle, Language, PlaygroundError};

/// The generation/refinement service boundary.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// A fresh project from a description.
    async fn generate(&self, prompt: &str) -> StudioResult<CodeBundle>;

    /// The whole project revised according to `prompt`.
    async fn refine(&self, prompt: &str, bundle: &CodeBundle) -> StudioResult<CodeBundle>;

    /// A new version of one file, with the other files given as context.
    async fn refine_file(
        &self,
        prompt: &str,
        language: Language,
        bundle: &CodeBundle,
    ) -> StudioResult<String>;
}

const GENERATE_SYSTEM_PROMPT: &str = "You are an expert full-stack web developer.
Generate a complete, working single-page web application for the user's description.

Requirements:
1. Return ONLY the raw HTML document, starting with <!DOCTYPE html>.
2. Put all CSS in one <style> tag inside <head>.
3. Put all JavaScript in one <script> tag at the end of <body>.
4. Make it modern, responsive and visually appealing.
5. No markdown fences, no explanations, no text outside the HTML.
6. Do not reference external CSS or JS files.
7. Use semantic HTML5 elements, ARIA labels, alt text and explicit form labels.";

const REFINE_SYSTEM_PROMPT: &str = "You are an expert web developer that refines existing code.

Rules:
1. You receive a complete HTML file with embedded CSS and JavaScript.
2. Apply ONLY the changes the user asks for and keep everything else intact.
3. Return the complete HTML file, CSS in <style> tags inside <head>, JavaScript in <script> tags before </body>.
4. No markdown fences and no explanations. Start directly with the HTML.";

fn refine_file_system_prompt(language: Language) -> String {
    let file = language.file_name();
    let specific = match language {
        Language::Css => "Return ONLY pure CSS: no HTML, no <style> tag. Start with a selector, an @rule or :root.",
        Language::Js => "Return ONLY pure JavaScript: no HTML, no <script> tag. Start with a statement.",
        Language::Html => "Return the complete HTML, preserving every element not affected by the request.",
    };
    format!(
        "You are a code editor that directly edits the file \"{file}\".\n\
Return ONLY the complete new content of \"{file}\": no markdown fences, no explanations, \
no prefixes such as \"Here is the code:\".\n\
{specific}\n\
The project context shows every file so class names, ids and functions stay consistent."
    )
}

fn refine_file_user_prompt(prompt: &str, language: Language, bundle: &CodeBundle) -> String {
    format!(
        "=== PROJECT CONTEXT START ===\n\
[index.html]:\n{}\n\n[index.css]:\n{}\n\n[index.js]:\n{}\n\
=== PROJECT CONTEXT END ===\n\n\
You are editing the file \"{}\". Apply the following change to ONLY this file: {}\n\n\
Return ONLY the updated code for {}:",
        bundle.html,
        bundle.css,
        bundle.js,
        language.file_name(),
        prompt,
        language.file_name(),
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Splits a whole-document answer. Blank answers, or ones with no html
/// left after partitioning, are rejected so the next model gets a turn.
fn bundle_from_answer(content: &str) -> StudioResult<CodeBundle> {
    if content.trim().is_empty() {
        return Err(PlaygroundError::EmptyResult.into());
    }
    let bundle = partition_response(content);
    if bundle.html.trim().is_empty() {
        return Err(PlaygroundError::EmptyResult.into());
    }
    Ok(bundle)
}

/// Chat-completions client for OpenRouter.
pub struct OpenRouterGateway {
    client: Client,
    config: GatewayConfig,
    api_key: String,
}

impl OpenRouterGateway {
    pub fn new(config: GatewayConfig, api_key: impl Into<String>) -> StudioResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StudioError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// One chat completion against one model.
    async fn ask(&self, model: &str, system: &str, user: &str) -> StudioResult<String> {
        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = if status == StatusCode::TOO_MANY_REQUESTS {
                "rate limited".to_string()
            } else {
                response.text().await.unwrap_or_default()
            };
            return Err(StudioError::ModelStatus {
                model: model.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| StudioError::NoChoices {
                model: model.to_string(),
            })
    }

    /// Asks each model in turn until `accept` takes an answer.
    async fn complete_with<T: Send>(
        &self,
        system: &str,
        user: &str,
        accept: impl Fn(&str) -> StudioResult<T> + Send + Sync,
    ) -> StudioResult<T> {
        let mut last = String::from("no models configured");
        for model in &self.config.models {
            let outcome = match self.ask(model, system, user).await {
                Ok(content) => accept(&content),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(value) => {
                    tracing::info!(%model, "gateway: model answered");
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(%model, error = %e, "gateway: trying next model");
                    last = e.to_string();
                }
            }
        }
        Err(StudioError::AllModelsFailed { last })
    }
}

#[async_trait]
impl Gateway for OpenRouterGateway {
    async fn generate(&self, prompt: &str) -> StudioResult<CodeBundle> {
        let prompt = validate_prompt(prompt)?;
        let user = format!("Create a functional web page for: {}", prompt);
        self.complete_with(GENERATE_SYSTEM_PROMPT, &user, bundle_from_answer)
            .await
    }

    async fn refine(&self, prompt: &str, bundle: &CodeBundle) -> StudioResult<CodeBundle> {
        let prompt = validate_prompt(prompt)?;
        let user = format!(
            "Current Code Context:\n{}\n\nUser Request: {}\n\nReturn the updated single HTML file:",
            inline_for_refinement(bundle),
            prompt
        );
        self.complete_with(REFINE_SYSTEM_PROMPT, &user, bundle_from_answer)
            .await
    }

    async fn refine_file(
        &self,
        prompt: &str,
        language: Language,
        bundle: &CodeBundle,
    ) -> StudioResult<String> {
        let prompt = validate_prompt(prompt)?;
        let system = refine_file_system_prompt(language);
        let user = refine_file_user_prompt(prompt, language, bundle);
        self.complete_with(&system, &user, |content| Ok(finish_refinement(content, language)?))
            .await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
