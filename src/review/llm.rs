//! Review-report generation through a hosted LLM.

use super::store::{AnnotationRecord, ReviewSettings};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_PROMPT: &str = "You are a thorough code reviewer. Based on the annotations below from a PDF review, generate a comprehensive written review report. Group findings by severity (Critical first, then Major, Minor, Suggestion, Question). For each finding, reference the page number and quoted text. Be specific, constructive, and actionable. End with a brief summary of overall quality.";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_PROVIDER: &str = "google";

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const HTTP_USER_AGENT: &str = concat!("kReview/", env!("CARGO_PKG_VERSION"));
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

const SEVERITY_ORDER: [&str; 5] = ["Critical", "Major", "Minor", "Suggestion", "Question"];

pub trait LlmProvider: Send + Sync {
    fn generate_review(&self, annotations: &[AnnotationRecord], document_title: &str)
    -> Result<String>;
}

/// Builds the provider named in `settings`. Requires an API key and a model.
pub fn create_provider(settings: &ReviewSettings) -> Result<Box<dyn LlmProvider>> {
    match settings.llm_provider.as_str() {
        "google" => Ok(Box::new(GeminiProvider::new(
            &settings.llm_api_key,
            &settings.llm_model,
            Some(settings.llm_temperature),
            Some(settings.llm_prompt.as_str()).filter(|prompt| !prompt.trim().is_empty()),
        )?)),
        other => bail!("unknown LLM provider \"{other}\"; supported: google"),
    }
}

/// Annotations grouped by category: severities first in fixed order, then
/// any remaining categories in first-seen order.
pub fn format_annotations(annotations: &[AnnotationRecord]) -> String {
    let mut groups: Vec<(&str, Vec<&AnnotationRecord>)> = Vec::new();
    for annotation in annotations {
        let category = if annotation.category_name.is_empty() {
            "Uncategorized"
        } else {
            annotation.category_name.as_str()
        };
        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(annotation),
            None => groups.push((category, vec![annotation])),
        }
    }

    let mut ordered: Vec<&(&str, Vec<&AnnotationRecord>)> = SEVERITY_ORDER
        .iter()
        .filter_map(|severity| groups.iter().find(|(name, _)| name == severity))
        .collect();
    ordered.extend(
        groups
            .iter()
            .filter(|(name, _)| !SEVERITY_ORDER.contains(name)),
    );

    let mut lines = Vec::new();
    for (category, members) in ordered {
        lines.push(format!("\n--- {} ---", category.to_uppercase()));
        for annotation in members {
            lines.push(format!("[Page {}]", annotation.page_number));
            lines.push(format!("  Text: \"{}\"", annotation.selected_text));
            if !annotation.comment.is_empty() {
                lines.push(format!("  Comment: {}", annotation.comment));
            }
        }
    }
    lines.join("\n")
}

pub struct GeminiProvider {
    api_key: String,
    model: String,
    temperature: f32,
    prompt: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: &str,
        model: &str,
        temperature: Option<f32>,
        prompt: Option<&str>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("API key is required");
        }
        if model.trim().is_empty() {
            bail!("Model name is required");
        }

        let base_url = std::env::var("KREVIEW_LLM_ENDPOINT")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        Ok(Self {
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
            prompt: prompt.unwrap_or(DEFAULT_PROMPT).to_string(),
            base_url,
        })
    }

    fn request_body<'a>(&'a self, user_text: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &self.prompt }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user_text }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

fn user_message(annotations: &[AnnotationRecord], document_title: &str) -> String {
    format!(
        "PDF Title: {}\n\nAnnotations:\n{}",
        document_title,
        format_annotations(annotations)
    )
}

impl LlmProvider for GeminiProvider {
    fn generate_review(
        &self,
        annotations: &[AnnotationRecord],
        document_title: &str,
    ) -> Result<String> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to create llm http client")?;

        let endpoint = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let user_text = user_message(annotations, document_title);
        crate::debug_log!(
            "[llm] requesting review for {} annotation(s) from {}",
            annotations.len(),
            self.model
        );

        let response = client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header(reqwest::header::USER_AGENT, HTTP_USER_AGENT)
            .json(&self.request_body(&user_text))
            .send()
            .context("failed to request review")?
            .error_for_status()
            .context("review request failed")?
            .json::<GenerateResponse>()
            .context("failed to parse review response")?;

        let text: String = response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            return Err(anyhow!("review response contained no text"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(category: &str, page_number: u32, text: &str, comment: &str) -> AnnotationRecord {
        AnnotationRecord {
            id: page_number as u64,
            pdf_id: 1,
            category_id: 1,
            category_name: category.to_string(),
            page_number,
            selected_text: text.to_string(),
            comment: comment.to_string(),
            highlight_rects: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn formats_severities_first_then_custom_categories() {
        let formatted = format_annotations(&[
            record("Style", 9, "colour", ""),
            record("Minor", 3, "typo", "fix spelling"),
            record("Critical", 1, "wrong claim", ""),
        ]);

        let critical = formatted.find("--- CRITICAL ---").unwrap();
        let minor = formatted.find("--- MINOR ---").unwrap();
        let style = formatted.find("--- STYLE ---").unwrap();
        assert!(critical < minor && minor < style);
        assert!(formatted.contains("[Page 3]\n  Text: \"typo\"\n  Comment: fix spelling"));
        assert!(!formatted.contains("[Page 1]\n  Text: \"wrong claim\"\n  Comment"));
    }

    #[test]
    fn provider_requires_key_and_model() {
        assert!(GeminiProvider::new("", "gemini", None, None).is_err());
        assert!(GeminiProvider::new("key", " ", None, None).is_err());

        let provider = GeminiProvider::new("key", "gemini", None, None).unwrap();
        assert_eq!(provider.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(provider.prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let settings = ReviewSettings {
            llm_provider: "openai".to_string(),
            llm_api_key: "key".to_string(),
            llm_model: "m".to_string(),
            ..ReviewSettings::default()
        };
        assert!(create_provider(&settings).is_err());
    }

    #[test]
    fn request_body_carries_prompt_and_temperature() {
        let provider = GeminiProvider::new("key", "gemini", Some(0.2), Some("be brief")).unwrap();
        let body = serde_json::to_value(provider.request_body("hello")).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(body["systemInstruction"].get("role").is_none());
    }
}
