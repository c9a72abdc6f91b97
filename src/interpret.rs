//! Hand-off to the text-understanding service and light shaping of its JSON answer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{AcquireError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const HTML_PROMPT: &str = "Parse the following HTML extracted from a restaurant's weekly menu page. The text is in German.
Be aware that a day may be empty due to a holiday or other reason. Important: The week starts on Monday and so does the menu.
Return a JSON structure where the key is the day of the week in English and the value is an array of menu options
for that day. Each menu option should have these keys:
- name: The name of the dish
- description: A description of the dish
- type: The type of dish (vegetarian, meat, etc.)
- link: A link to the dish on the restaurant's website
Format your response as clean, properly formatted JSON only, with no explanations or additional text.
Remove any double commas or other formatting issues from the description but don't change the content.
Here is the extracted HTML of the menu:
";

const PDF_PROMPT: &str = "Parse the following extracted text from a restaurant's menu PDF.
Return a JSON structure with an array of menu options. Each menu option should have these keys:
- name: The name of the dish
- description: A description of the dish
- type: The type of dish (vegetarian, meat, etc.)
Only include food, ignore drinks.
Format your response as clean, properly formatted JSON only, with no explanations or additional text.

Extracted PDF content:
";

/// A service that answers a prompt with text.
#[async_trait]
pub trait MenuInterpreter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiInterpreter {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiInterpreter {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| AcquireError::transport(DEFAULT_BASE_URL, err))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Reads `OPENAI_API_KEY`, plus `OPENAI_MODEL` and `OPENAI_BASE_URL` when set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                AcquireError::Interpret("OPENAI_API_KEY environment variable not set".into())
            })?;
        let mut interpreter = Self::new(api_key)?;
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            interpreter.model = model;
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            interpreter.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(interpreter)
    }
}

#[async_trait]
impl MenuInterpreter for OpenAiInterpreter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| AcquireError::transport(&url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::Status { url, status });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| AcquireError::Interpret(format!("unexpected API response: {err}")))?;
        debug!(model = %self.model, choices = body.choices.len(), "completion received");
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AcquireError::Interpret("no response from API".into()))
    }
}

/// Returns the JSON in `response`, cutting away prose or code fences around an object.
pub fn extract_json(response: &str) -> Result<Value> {
    let err = match serde_json::from_str::<Value>(response) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&response[start..=end]) {
                return Ok(value);
            }
        }
    }
    Err(AcquireError::Interpret(format!("API returned invalid JSON: {err}")))
}

/// Weekly menu from reduced HTML: `{"type": "daily", "menu": {day: [dish]}}`.
pub async fn interpret_html(service: &dyn MenuInterpreter, text: &str) -> Result<Value> {
    let answer = service.complete(&format!("{HTML_PROMPT}{text}")).await?;
    let days = extract_json(&answer)?;
    if !days.is_object() {
        return Err(AcquireError::Interpret(
            "expected an object keyed by weekday".into(),
        ));
    }
    Ok(json!({ "type": "daily", "menu": days }))
}

/// Menu from PDF text: `{"type": "weekly", "menu": [dish]}`, every dish tagged
/// with the restaurant and the PDF link.
pub async fn interpret_pdf(
    service: &dyn MenuInterpreter,
    text: &str,
    source_name: &str,
    pdf_url: &str,
) -> Result<Value> {
    let answer = service.complete(&format!("{PDF_PROMPT}{text}")).await?;
    let parsed = extract_json(&answer)?;

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut object) => ["menuItems", "menuOptions"]
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(items)) if !items.is_empty() => Some(items),
                _ => None,
            })
            .ok_or_else(|| AcquireError::Interpret("failed to find menu items in JSON".into()))?,
        _ => return Err(AcquireError::Interpret("failed to find menu items in JSON".into())),
    };

    let items: Vec<Value> = items
        .into_iter()
        .map(|mut item| {
            if let Some(dish) = item.as_object_mut() {
                dish.insert("restaurant".into(), json!(source_name));
                dish.insert("link".into(), json!(pdf_url));
            }
            item
        })
        .collect();
    Ok(json!({ "type": "weekly", "menu": items }))
}

/// Prefixes root-relative `link` fields of a daily menu with `base_url`.
pub fn absolutize_links(menu: &mut Value, base_url: &str) {
    let Some(days) = menu.get_mut("menu").and_then(Value::as_object_mut) else {
        return;
    };
    let base = base_url.trim_end_matches('/');
    for dishes in days.values_mut().filter_map(Value::as_array_mut) {
        for dish in dishes {
            if let Some(link) = dish.get_mut("link") {
                let absolute = link
                    .as_str()
                    .filter(|l| l.starts_with('/'))
                    .map(|relative| format!("{base}{relative}"));
                if let Some(absolute) = absolute {
                    *link = Value::String(absolute);
                }
            }
        }
    }
}

pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
