use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::core::config::Settings;

#[derive(Debug, Clone)]
pub(crate) struct RenderedDocument {
    pub(crate) content_type: String,
    pub(crate) body: Vec<u8>,
}

/// Turns a named template plus a JSON data bag into a document.
#[async_trait]
pub(crate) trait TemplateRenderer: Send + Sync {
    async fn render(&self, template: &str, data: &Value) -> Result<RenderedDocument>;
}

pub(crate) fn from_settings(settings: &Settings) -> Result<Arc<dyn TemplateRenderer>> {
    match settings.admit_card().renderer_url.as_deref() {
        Some(url) => {
            let renderer = HttpTemplateRenderer::new(
                url,
                Duration::from_secs(settings.admit_card().renderer_timeout_seconds),
            )?;
            tracing::info!(renderer_url = %url, "Using HTTP template renderer");
            Ok(Arc::new(renderer))
        }
        None => {
            tracing::info!("RENDERER_URL not set; admit cards are rendered as plain text");
            Ok(Arc::new(PlainTextRenderer))
        }
    }
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    template: &'a str,
    data: &'a Value,
}

#[derive(Debug, Clone)]
pub(crate) struct HttpTemplateRenderer {
    client: Client,
    endpoint: String,
}

impl HttpTemplateRenderer {
    pub(crate) fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build renderer HTTP client")?;

        Ok(Self { client, endpoint: format!("{}/render", base_url.trim_end_matches('/')) })
    }
}

#[async_trait]
impl TemplateRenderer for HttpTemplateRenderer {
    async fn render(&self, template: &str, data: &Value) -> Result<RenderedDocument> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RenderRequest { template, data })
            .send()
            .await
            .context("Renderer request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            anyhow::bail!("Renderer returned {status}: {snippet}");
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/pdf")
            .to_string();
        let body = response.bytes().await.context("Failed to read rendered document")?;

        Ok(RenderedDocument { content_type, body: body.to_vec() })
    }
}

/// Fallback renderer: a readable text document built straight from the data bag.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PlainTextRenderer;

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some("-".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn label(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for word in key.split('_').filter(|word| !word.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            words.push(first.to_uppercase().chain(chars).collect());
        }
    }
    words.join(" ")
}

fn write_section(out: &mut String, value: &Value, indent: usize) {
    let Value::Object(fields) = value else {
        return;
    };
    let pad = " ".repeat(indent);
    for (key, field) in fields {
        match field {
            Value::Array(items) => {
                out.push_str(&format!("{pad}{}:\n", label(key)));
                for item in items {
                    match scalar(item) {
                        Some(text) => out.push_str(&format!("{pad}  - {text}\n")),
                        None => {
                            out.push_str(&format!("{pad}  -\n"));
                            write_section(out, item, indent + 4);
                        }
                    }
                }
            }
            Value::Object(_) => {
                out.push_str(&format!("{pad}{}:\n", label(key)));
                write_section(out, field, indent + 2);
            }
            other => {
                let text = scalar(other).unwrap_or_default();
                out.push_str(&format!("{pad}{}: {text}\n", label(key)));
            }
        }
    }
}

#[async_trait]
impl TemplateRenderer for PlainTextRenderer {
    async fn render(&self, template: &str, data: &Value) -> Result<RenderedDocument> {
        let mut out = format!("{}\n{}\n", label(template).to_uppercase(), "=".repeat(40));
        write_section(&mut out, data, 0);
        Ok(RenderedDocument {
            content_type: "text/plain; charset=utf-8".to_string(),
            body: out.into_bytes(),
        })
    }
}
