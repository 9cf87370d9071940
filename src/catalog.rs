//! Model catalog: what the server can run
//!
//! The catalog is read once at startup. An unreachable server is fatal; an
//! empty list is not, the session starts with submission disabled.

use crate::config::ChatConfig;
use crate::llm::{LlmError, OllamaService};
use async_trait::async_trait;
use std::io::{self, Write};
use thiserror::Error;

/// Process status when the server cannot be used at startup
pub const STARTUP_FAILURE_EXIT_CODE: i32 = 1;

/// Source of available model identifiers
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Confirm the server is up
    async fn probe(&self) -> Result<(), LlmError>;

    /// Model names in the server's order
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

#[async_trait]
impl ModelCatalog for OllamaService {
    async fn probe(&self) -> Result<(), LlmError> {
        OllamaService::probe(self).await
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        OllamaService::list_models(self).await
    }
}

/// Startup failures. All of them end the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartupError {
    #[error("Could not create HTTP client: {}", .0.message)]
    Client(LlmError),
    #[error("Model server is not reachable: {}", .0.message)]
    Unreachable(LlmError),
    #[error("Could not list models: {}", .0.message)]
    Listing(LlmError),
}

/// Probe the server, then fetch its model list
pub async fn load_catalog<M: ModelCatalog + ?Sized>(catalog: &M) -> Result<Vec<String>, StartupError> {
    catalog.probe().await.map_err(StartupError::Unreachable)?;
    let models = catalog.list_models().await.map_err(StartupError::Listing)?;

    if models.is_empty() {
        tracing::warn!("Model server reported no models; submission disabled");
    } else {
        tracing::info!(count = models.len(), ?models, "Loaded model catalog");
    }
    Ok(models)
}

/// Build the transport and load the catalog. The interactive session only
/// starts if this succeeds.
pub async fn connect(config: &ChatConfig) -> Result<(OllamaService, Vec<String>), StartupError> {
    let ollama =
        OllamaService::new(&config.base_url, config.probe_timeout).map_err(StartupError::Client)?;
    let models = load_catalog(&ollama).await?;
    Ok((ollama, models))
}

/// Diagnostic printed before exiting with `STARTUP_FAILURE_EXIT_CODE`
pub fn report_startup_failure(
    error: &StartupError,
    base_url: &str,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "{error}")?;
    writeln!(out, "Is Ollama running at {base_url}?")?;
    out.flush()
}

/// Pick the model to preselect. A current choice survives if the server still
/// lists it; otherwise the first listed model wins. With no models the
/// current choice is kept as a display default.
pub fn reconcile_selection(models: &[String], current: Option<&str>) -> Option<String> {
    match current {
        Some(id) if models.is_empty() || models.iter().any(|m| m == id) => Some(id.to_string()),
        _ => models.first().cloned(),
    }
}
