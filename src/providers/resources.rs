//! Built-in resources.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::FileResourceConfig;
use crate::error::{McpError, Result};
use crate::protocol::{Implementation, Resource, ResourceContents};
use crate::server::features::{ResourceManager, ResourceProvider};
use crate::utils::format_duration;

pub const ABOUT_URI: &str = "info://server/about";
pub const STATUS_URI: &str = "data://server/status";

/// Serves a fixed text body
pub struct StaticTextProvider {
    text: String,
    mime_type: String,
}

impl StaticTextProvider {
    pub fn new(text: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[async_trait::async_trait]
impl ResourceProvider for StaticTextProvider {
    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        Ok(vec![ResourceContents::text(
            uri,
            Some(self.mime_type.clone()),
            self.text.clone(),
        )])
    }
}

/// Live server status, generated on every read
pub struct StatusProvider {
    server: Implementation,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl StatusProvider {
    pub fn new(server: Implementation) -> Self {
        Self {
            server,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }
}

#[async_trait::async_trait]
impl ResourceProvider for StatusProvider {
    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let status = json!({
            "status": "running",
            "timestamp": Utc::now().to_rfc3339(),
            "startedAt": self.started_at.to_rfc3339(),
            "uptimeSeconds": self.started.elapsed().as_secs(),
            "uptime": format_duration(self.started.elapsed()),
            "server": {"name": self.server.name, "version": self.server.version},
        });
        let text = serde_json::to_string_pretty(&status)?;
        Ok(vec![ResourceContents::text(
            uri,
            Some("application/json".to_string()),
            text,
        )])
    }
}

/// Serves configured local files under their `file://` URIs
pub struct FileResourceProvider {
    files: HashMap<String, PathBuf>,
}

impl FileResourceProvider {
    /// Resolve each configured file to an absolute path and `file://` URI
    pub fn from_config(files: &[FileResourceConfig]) -> Result<(Self, Vec<Resource>)> {
        let mut paths = HashMap::new();
        let mut resources = Vec::new();

        for file in files {
            let path = file.path.canonicalize().map_err(|e| {
                McpError::Config(format!("Cannot resolve resource file {}: {}", file.path.display(), e))
            })?;
            if !path.is_file() {
                return Err(McpError::Config(format!(
                    "Resource path is not a file: {}",
                    path.display()
                )));
            }

            let uri = Url::from_file_path(&path)
                .map_err(|_| McpError::Config(format!("Cannot build URI for {}", path.display())))?
                .to_string();

            let name = file.name.clone().unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| uri.clone())
            });
            let mut resource = Resource::new(uri.clone(), name)
                .with_mime_type(mime_guess::from_path(&path).first_or_octet_stream().to_string());
            if let Some(description) = &file.description {
                resource = resource.with_description(description.clone());
            }

            resources.push(resource);
            paths.insert(uri, path);
        }

        Ok((Self { files: paths }, resources))
    }
}

#[async_trait::async_trait]
impl ResourceProvider for FileResourceProvider {
    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>> {
        let path = self
            .files
            .get(uri)
            .ok_or_else(|| McpError::not_found("Resource", uri))?;

        let contents = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
        debug!("Read {} bytes from {}", contents.len(), path.display());

        match String::from_utf8(contents) {
            Ok(text) => Ok(vec![ResourceContents::text(uri, Some(mime_type), text)]),
            Err(e) => Ok(vec![ResourceContents::blob(
                uri,
                Some(mime_type),
                STANDARD.encode(e.into_bytes()),
            )]),
        }
    }
}

/// Register the about and status resources for `server` plus any configured files
pub fn register_all(
    resources: &ResourceManager,
    server: &Implementation,
    files: &[FileResourceConfig],
) -> Result<()> {
    let about = format!(
        "{} {}\n\nA Model Context Protocol server exposing sample tools, resources and prompts.\n",
        server.name, server.version
    );
    resources.register(
        Resource::new(ABOUT_URI, "About this server")
            .with_description("Server name, version and purpose")
            .with_mime_type("text/plain"),
        Arc::new(StaticTextProvider::new(about, "text/plain")),
    )?;

    resources.register(
        Resource::new(STATUS_URI, "Server status")
            .with_description("Live status and uptime")
            .with_mime_type("application/json"),
        Arc::new(StatusProvider::new(server.clone())),
    )?;

    if !files.is_empty() {
        let (provider, descriptors) = FileResourceProvider::from_config(files)?;
        let provider: Arc<dyn ResourceProvider> = Arc::new(provider);
        for resource in descriptors {
            resources.register(resource, provider.clone())?;
        }
    }
    Ok(())
}
