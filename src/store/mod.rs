//! Document retrieval backend and the process-wide handle to it.

pub mod qdrant;

use async_trait::async_trait;
use futures::Future;
use log::{ debug, info };
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vector store is not configured: {0}")]
    Config(String),
    #[error("failed to connect to vector store: {0}")]
    Connect(String),
    #[error("collection '{0}' does not exist")]
    MissingCollection(String),
    #[error("vector search failed: {0}")]
    Search(String),
    #[error("document '{id}' could not be fetched: {reason}")]
    Fetch {
        id: String,
        reason: String,
    },
    #[error("document '{0}' not found")]
    NotFound(String),
    #[error("{operation} timed out after {millis} ms")]
    Timeout {
        operation: &'static str,
        millis: u128,
    },
}

/// Payload fields that hold the stored vector and are useless as context.
pub const EMBEDDING_FIELDS: [&str; 2] = ["embedding", "vector"];

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Nearest neighbours of `vector`, best first.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, StoreError>;

    /// Full stored content of one document.
    async fn fetch(&self, id: &str) -> Result<Value, StoreError>;
}

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn DocumentStore>, StoreError>> + Send>>;

/// A store connection that is opened on first use and then shared.
///
/// Concurrent first callers wait on the same connection attempt. A failed
/// attempt is not remembered, so the next caller tries again.
pub struct LazyStore {
    cell: OnceCell<Arc<dyn DocumentStore>>,
    connect: Box<dyn Fn() -> ConnectFuture + Send + Sync>,
}

impl LazyStore {
    pub fn new<F, Fut>(connect: F) -> Self
        where
            F: Fn() -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<Arc<dyn DocumentStore>, StoreError>> + Send + 'static
    {
        Self {
            cell: OnceCell::new(),
            connect: Box::new(move || Box::pin(connect())),
        }
    }

    /// Wraps an already open store.
    pub fn ready(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(store)),
            connect: Box::new(|| {
                Box::pin(async { Err(StoreError::Config("store was supplied pre-connected".into())) })
            }),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        if let Some(store) = self.cell.get() {
            debug!("Reusing existing vector store connection");
            return Ok(Arc::clone(store));
        }

        let store = self.cell.get_or_try_init(|| {
            info!("No vector store connection yet, connecting...");
            (self.connect)()
        }).await?;
        Ok(Arc::clone(store))
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}
