//! Initialization helpers for preparing runtime assets before starting the
//! voice bridge.
//!
//! This module hosts the logic behind the `voice-bridge init` CLI command. The
//! command downloads the Whisper GGML model named by `WHISPER_MODEL_PATH` so
//! that server startups never fetch anything over the network.
//!
//! ```text
//! $ WHISPER_MODEL_PATH=models/ggml-base.bin voice-bridge init --sha256 <hex>
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Where whisper.cpp publishes its GGML models.
pub const DEFAULT_MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Download even when the model file already exists
    pub force: bool,
    /// Expected SHA-256 of the model, hex encoded
    pub sha256: Option<String>,
    pub base_url: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            force: false,
            sha256: None,
            base_url: DEFAULT_MODEL_BASE_URL.to_string(),
        }
    }
}

/// Ensure the configured Whisper model is present, downloading it when missing.
pub async fn run(config: &ServerConfig, options: &InitOptions) -> Result<PathBuf> {
    let model_path = config.stt.model_path.clone();
    let expected = options
        .sha256
        .as_deref()
        .map(normalize_digest)
        .transpose()?;

    if model_path.exists() && !options.force {
        if let Some(expected) = &expected {
            let actual = file_digest(&model_path).await?;
            if &actual != expected {
                bail!(
                    "Existing model {} has SHA-256 {actual}, expected {expected}. Re-run with --force.",
                    model_path.display()
                );
            }
        }
        info!("Whisper model already present at {:?}", model_path);
        return Ok(model_path);
    }

    let url = model_url(&options.base_url, &model_path)?;
    info!("Downloading Whisper model from: {}", url);
    download_file(&url, &model_path, expected.as_deref()).await?;

    Ok(model_path)
}

/// Download URL for the model file named by `model_path`.
pub fn model_url(base_url: &str, model_path: &Path) -> Result<String> {
    let file_name = model_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("Model path {:?} has no file name", model_path))?;
    Ok(format!("{}/{file_name}", base_url.trim_end_matches('/')))
}

async fn download_file(url: &str, path: &Path, expected: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let response = reqwest::get(url)
        .await
        .context("Failed to download Whisper model")?;

    if !response.status().is_success() {
        bail!("Failed to download Whisper model: HTTP {}", response.status());
    }

    // Stream into a sibling file so an interrupted download never looks complete
    let partial = path.with_extension("part");
    let mut file = fs::File::create(&partial)
        .await
        .with_context(|| format!("Failed to create {}", partial.display()))?;
    let mut hasher = Sha256::new();
    let mut written: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&partial).await;
                return Err(anyhow!("Download interrupted: {e}"));
            }
        };
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    let actual = hex::encode(hasher.finalize());
    match expected {
        Some(expected) if expected != actual => {
            let _ = fs::remove_file(&partial).await;
            bail!("SHA-256 mismatch for {url}: expected {expected}, got {actual}");
        }
        Some(_) => info!("SHA-256 verified: {}", actual),
        None => warn!(
            "No --sha256 given; downloaded model has SHA-256 {}",
            actual
        ),
    }

    fs::rename(&partial, path).await?;
    info!("Downloaded {} bytes to: {:?}", written, path);

    Ok(())
}

async fn file_digest(path: &Path) -> Result<String> {
    let data = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(hex::encode(Sha256::digest(&data)))
}

fn normalize_digest(digest: &str) -> Result<String> {
    let digest = digest.trim().to_ascii_lowercase();
    let bytes = hex::decode(&digest).context("SHA-256 must be hex encoded")?;
    if bytes.len() != 32 {
        bail!("SHA-256 must be 64 hex characters, got {}", digest.len());
    }
    Ok(digest)
}
