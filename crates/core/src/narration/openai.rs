use crate::config::Settings;
use crate::narration::Narrator;
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini-tts";
const DEFAULT_VOICE: &str = "alloy";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct OpenAiNarrator {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

impl OpenAiNarrator {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut narrator = Self::new(api_key, base_url)?;
        if let Ok(model) = std::env::var("OPENAI_TTS_MODEL") {
            narrator.model = model;
        }
        if let Ok(voice) = std::env::var("OPENAI_TTS_VOICE") {
            narrator.voice = voice;
        }
        Ok(narrator)
    }

    pub fn new(api_key: String, base_url: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Narrator for OpenAiNarrator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let url = format!("{}/v1/audio/speech", self.base_url.trim_end_matches('/'));
        let req = SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: text,
            response_format: "mp3",
        };

        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("OpenAI speech request failed")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!(
                "OpenAI speech request rejected (status={status}): {}",
                body.chars().take(200).collect::<String>()
            );
        }

        let audio = res
            .bytes()
            .await
            .context("failed to read OpenAI speech response body")?;
        Ok(audio.to_vec())
    }
}
