//! # smc-server
//!
//! MCP server bridging tool calls to Minecraft server plugin APIs.
//!
//! This crate provides:
//! - `ConnectionRegistry`, the credential-keyed table of live sessions
//! - Tool adapters turning plugin API payloads into stable tool results
//! - MCP JSON-RPC protocol handling and the tool catalog
//! - The stdio transport

pub mod adapters;
pub mod mcp;
pub mod registry;
pub mod tools;
pub mod transport;

pub use registry::{ConnectionRegistry, RegistryError, Session};

use mcp::ServerInfo;
use smc_core::Result;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Minecraft MCP server. Cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct SmcServer {
    registry: Arc<ConnectionRegistry>,
    info: ServerInfo,
}

impl SmcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server sharing an existing registry
    pub fn with_registry(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            info: ServerInfo::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Run the server on stdio transport
    pub async fn run_stdio(self) -> Result<()> {
        transport::stdio::run(self).await
    }

    /// Serve an arbitrary line-delimited stream pair
    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        transport::stdio::serve(self, reader, writer).await
    }

    /// Close every registered session
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }
}
