use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::audio::{AudioBackendConfig, AudioSource, PermissionMode};
use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub dialog: DialogConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Tear down sessions untouched for this many seconds
    #[serde(default)]
    pub session_idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Synthetic,
    File,
    Microphone,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    pub backend: BackendKind,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration of each buffered chunk
    pub frame_ms: u64,
    /// Duration of one elapsed-time tick
    pub tick_ms: u64,
    /// WAV file replayed by the file backend
    #[serde(default)]
    pub source_file: Option<String>,
    /// Scripted outcome for the synthetic backend
    #[serde(default)]
    pub permission: PermissionMode,
    /// Simulated permission prompt latency for the synthetic backend
    #[serde(default)]
    pub grant_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactConfig {
    pub name_prefix: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DialogConfig {
    /// Stop recordings automatically after this many seconds
    pub max_recording_secs: Option<u64>,
}

impl Config {
    /// Load from `path` (any format the config crate knows, e.g. TOML),
    /// overridden by `VOICE_NOTES__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VOICE_NOTES").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Invalid voice note configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.capture.tick_ms == 0 {
            anyhow::bail!("capture.tick_ms must be greater than zero");
        }
        if self.capture.sample_rate == 0 {
            anyhow::bail!("capture.sample_rate must be greater than zero");
        }
        if self.capture.channels == 0 {
            anyhow::bail!("capture.channels must be greater than zero");
        }
        if self.service.http.session_idle_secs == Some(0) {
            anyhow::bail!("service.http.session_idle_secs must be greater than zero");
        }
        if self.capture.backend == BackendKind::File && self.capture.source_file.is_none() {
            anyhow::bail!("capture.source_file is required for the file backend");
        }
        Ok(())
    }

    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.capture.sample_rate,
            target_channels: self.capture.channels,
            buffer_duration_ms: self.capture.frame_ms,
        }
    }

    pub fn audio_source(&self) -> AudioSource {
        match self.capture.backend {
            BackendKind::Synthetic => AudioSource::Synthetic {
                permission: self.capture.permission,
                grant_delay: Duration::from_millis(self.capture.grant_delay_ms),
            },
            BackendKind::File => {
                AudioSource::File(self.capture.source_file.clone().unwrap_or_default())
            }
            BackendKind::Microphone => AudioSource::Microphone,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_interval: Duration::from_millis(self.capture.tick_ms),
            artifact_name_prefix: self.artifact.name_prefix.clone(),
            ..SessionConfig::default()
        }
    }

    pub fn max_recording(&self) -> Option<Duration> {
        self.dialog.max_recording_secs.map(Duration::from_secs)
    }

    pub fn session_idle(&self) -> Option<Duration> {
        self.service.http.session_idle_secs.map(Duration::from_secs)
    }
}
