//! Synthesis Client boundary: one sentence of text plus a voice reference in, audio bytes out.
//!
//! [`HttpSynthesisClient`] talks to a GPT-SoVITS style HTTP service (`GET {base_url}/tts`
//! with the request as query parameters). [`PlaceholderSynthesis`] returns a short silent
//! WAV so the pipeline can run without a backend.

use crate::error::SynthesisError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Output container requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Wav,
    Ogg,
    Aac,
    Raw,
}

impl MediaFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Wav => "wav",
            MediaFormat::Ogg => "ogg",
            MediaFormat::Aac => "aac",
            MediaFormat::Raw => "raw",
        }
    }

    /// File extension used for stored artifacts.
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Raw => "pcm",
            other => other.as_str(),
        }
    }
}

/// Sampling knobs forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub repetition_penalty: f32,
    /// -1 lets the backend pick.
    pub seed: i64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            top_p: 1.0,
            temperature: 1.0,
            repetition_penalty: 1.35,
            seed: -1,
        }
    }
}

/// Per-deployment defaults applied to every request (section `[synthesis]` of the config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisDefaults {
    pub text_lang: String,
    /// Language of the reference prompt. Falls back to `text_lang`.
    pub prompt_lang: Option<String>,
    pub prompt_text: String,
    pub text_split_method: String,
    pub batch_size: u32,
    pub batch_threshold: f32,
    pub split_bucket: bool,
    pub speed_factor: f32,
    pub fragment_interval: f32,
    pub parallel_infer: bool,
    pub streaming_mode: bool,
    pub media_type: MediaFormat,
    pub sampling: SamplingParams,
}

impl Default for SynthesisDefaults {
    fn default() -> Self {
        Self {
            text_lang: "zh".to_string(),
            prompt_lang: None,
            prompt_text: String::new(),
            text_split_method: "cut5".to_string(),
            batch_size: 1,
            batch_threshold: 0.75,
            split_bucket: true,
            speed_factor: 1.0,
            fragment_interval: 0.3,
            parallel_infer: true,
            streaming_mode: false,
            media_type: MediaFormat::Wav,
            sampling: SamplingParams::default(),
        }
    }
}

/// One sentence to synthesize.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub reference_audio: PathBuf,
    pub text_lang: String,
    pub prompt_lang: String,
    pub prompt_text: String,
    pub text_split_method: String,
    pub batch_size: u32,
    pub batch_threshold: f32,
    pub split_bucket: bool,
    pub speed_factor: f32,
    pub fragment_interval: f32,
    pub parallel_infer: bool,
    pub streaming_mode: bool,
    pub media_type: MediaFormat,
    pub sampling: SamplingParams,
}

impl SynthesisRequest {
    /// Build a request from deployment defaults. `language` overrides both the text and the
    /// prompt language when given.
    pub fn from_defaults(
        text: impl Into<String>,
        reference_audio: impl Into<PathBuf>,
        defaults: &SynthesisDefaults,
        language: Option<&str>,
    ) -> Self {
        let text_lang = language.unwrap_or(&defaults.text_lang).to_string();
        let prompt_lang = language
            .or(defaults.prompt_lang.as_deref())
            .unwrap_or(&text_lang)
            .to_string();
        Self {
            text: text.into(),
            reference_audio: reference_audio.into(),
            text_lang,
            prompt_lang,
            prompt_text: defaults.prompt_text.clone(),
            text_split_method: defaults.text_split_method.clone(),
            batch_size: defaults.batch_size,
            batch_threshold: defaults.batch_threshold,
            split_bucket: defaults.split_bucket,
            speed_factor: defaults.speed_factor,
            fragment_interval: defaults.fragment_interval,
            parallel_infer: defaults.parallel_infer,
            streaming_mode: defaults.streaming_mode,
            media_type: defaults.media_type,
            sampling: defaults.sampling.clone(),
        }
    }

    /// Query string pairs for the HTTP backend.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("text", self.text.clone()),
            ("text_lang", self.text_lang.clone()),
            ("ref_audio_path", self.reference_audio.display().to_string()),
            ("prompt_text", self.prompt_text.clone()),
            ("prompt_lang", self.prompt_lang.clone()),
            ("top_k", self.sampling.top_k.to_string()),
            ("top_p", self.sampling.top_p.to_string()),
            ("temperature", self.sampling.temperature.to_string()),
            ("text_split_method", self.text_split_method.clone()),
            ("batch_size", self.batch_size.to_string()),
            ("batch_threshold", self.batch_threshold.to_string()),
            ("split_bucket", self.split_bucket.to_string()),
            ("speed_factor", self.speed_factor.to_string()),
            ("fragment_interval", self.fragment_interval.to_string()),
            ("seed", self.sampling.seed.to_string()),
            ("media_type", self.media_type.as_str().to_string()),
            ("streaming_mode", self.streaming_mode.to_string()),
            ("parallel_infer", self.parallel_infer.to_string()),
            ("repetition_penalty", self.sampling.repetition_penalty.to_string()),
        ]
    }
}

/// Turns one sentence into audio bytes. Empty bytes are treated as a failure by the caller.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError>;

    /// Cheap reachability probe. Backends without a remote side are always reachable.
    async fn check_connection(&self) -> bool {
        true
    }
}

/// HTTP client for a GPT-SoVITS compatible `/tts` endpoint.
#[derive(Debug, Clone)]
pub struct HttpSynthesisClient {
    base_url: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSynthesisClient {
    pub fn new(base_url: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl SynthesisBackend for HttpSynthesisClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let res = self
            .client
            .get(self.url())
            .query(&request.query_pairs())
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SynthesisError::Backend {
                status: status.as_u16(),
                message: backend_error_message(status.as_u16(), &body),
            });
        }

        let bytes = res.bytes().await?;
        debug!(
            target: "seqvoice::synthesis",
            bytes = bytes.len(),
            "Backend returned audio"
        );
        Ok(bytes.to_vec())
    }

    async fn check_connection(&self) -> bool {
        match self
            .client
            .get(&self.base_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(target: "seqvoice::synthesis", base_url = %self.base_url, error = %e, "Synthesis backend unreachable");
                false
            }
        }
    }
}

/// Error text from a non-success body: `message` plus `Exception` when the backend sent
/// JSON, otherwise the status code.
fn backend_error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    match (field("message"), field("Exception")) {
        (Some(msg), Some(exc)) => format!("{} ({})", msg, exc),
        (Some(msg), None) => msg,
        (None, Some(exc)) => exc,
        (None, None) => format!("HTTP {}", status),
    }
}

/// Produces `duration` of 16-bit mono silence as a WAV file, ignoring the text.
#[derive(Debug, Clone)]
pub struct PlaceholderSynthesis {
    sample_rate: u32,
    duration: Duration,
}

impl PlaceholderSynthesis {
    pub fn new(sample_rate: u32, duration: Duration) -> Self {
        Self {
            sample_rate,
            duration,
        }
    }
}

impl Default for PlaceholderSynthesis {
    fn default() -> Self {
        Self::new(16_000, Duration::from_millis(250))
    }
}

#[async_trait]
impl SynthesisBackend for PlaceholderSynthesis {
    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        silent_wav(self.sample_rate, self.duration)
    }
}

fn silent_wav(sample_rate: u32, duration: Duration) -> Result<Vec<u8>, SynthesisError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let samples = (sample_rate as f64 * duration.as_secs_f64()) as u64;
    let mut buf = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)
            .map_err(|e| SynthesisError::Storage(e.to_string()))?;
        for _ in 0..samples {
            writer
                .write_sample(0i16)
                .map_err(|e| SynthesisError::Storage(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| SynthesisError::Storage(e.to_string()))?;
    }
    Ok(buf)
}
