//! Service configuration. Load from TOML and environment.

use crate::error::{SeqVoiceError, SeqVoiceResult};
use crate::merge::DEFAULT_SHORT_FRAGMENT_THRESHOLD;
use crate::synthesis::SynthesisDefaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-sentence timeout in seconds.
pub const DEFAULT_SENTENCE_TIMEOUT_SECS: u64 = 180;

const DEFAULT_CONFIG_PATH: &str = "config/seqvoice.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeqVoiceConfig {
    /// HTTP port for the gateway.
    pub port: u16,
    pub bind_addr: String,
    /// Uploaded voice references and synthesized artifacts.
    pub storage_dir: PathBuf,
    pub log_dir: PathBuf,
    #[serde(default)]
    pub segmenter: SegmenterSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorTimeouts,
    #[serde(default)]
    pub synthesis: SynthesisSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterSettings {
    /// Fragments shorter than this (in codepoints) merge forward.
    pub short_fragment_threshold: usize,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            short_fragment_threshold: DEFAULT_SHORT_FRAGMENT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorTimeouts {
    pub sentence_timeout_secs: u64,
}

impl Default for OrchestratorTimeouts {
    fn default() -> Self {
        Self {
            sentence_timeout_secs: DEFAULT_SENTENCE_TIMEOUT_SECS,
        }
    }
}

/// Which synthesis backend the gateway wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    #[default]
    Http,
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub mode: SynthesisMode,
    pub base_url: String,
    pub endpoint: String,
    pub defaults: SynthesisDefaults,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            mode: SynthesisMode::Http,
            base_url: "http://127.0.0.1:9880".to_string(),
            endpoint: "/tts".to_string(),
            defaults: SynthesisDefaults::default(),
        }
    }
}

impl SeqVoiceConfig {
    /// Precedence: env `SEQVOICE_CONFIG` path > `config/seqvoice.toml` > defaults, then
    /// `SEQVOICE__*` environment overrides.
    pub fn load() -> SeqVoiceResult<Self> {
        let path = std::env::var("SEQVOICE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Some(Path::new(&path)))
    }

    pub fn load_from(path: Option<&Path>) -> SeqVoiceResult<Self> {
        let builder = config::Config::builder()
            .set_default("port", 8000_i64)?
            .set_default("bind_addr", "0.0.0.0")?
            .set_default("storage_dir", "./voice_and_output")?
            .set_default("log_dir", "./logs")?;

        let builder = match path {
            Some(path) if path.exists() => builder.add_source(config::File::from(path)),
            _ => builder,
        };

        let built = builder
            .add_source(config::Environment::with_prefix("SEQVOICE").separator("__"))
            .build()?;

        let cfg: Self = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SeqVoiceResult<()> {
        if self.segmenter.short_fragment_threshold == 0 {
            return Err(SeqVoiceError::Config(
                "segmenter.short_fragment_threshold must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.sentence_timeout_secs == 0 {
            return Err(SeqVoiceError::Config(
                "orchestrator.sentence_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.synthesis.mode == SynthesisMode::Http && self.synthesis.base_url.trim().is_empty() {
            return Err(SeqVoiceError::Config("synthesis.base_url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn sentence_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator.sentence_timeout_secs)
    }

    /// `bind_addr:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

impl Default for SeqVoiceConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_addr: "0.0.0.0".to_string(),
            storage_dir: PathBuf::from("./voice_and_output"),
            log_dir: PathBuf::from("./logs"),
            segmenter: SegmenterSettings::default(),
            orchestrator: OrchestratorTimeouts::default(),
            synthesis: SynthesisSettings::default(),
        }
    }
}
