use async_trait::async_trait;
use log::{ error, info, warn };
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{ GetPointsBuilder, PointId, SearchPointsBuilder };
use qdrant_client::qdrant::point_id::PointIdOptions;
use serde_json::{ Map, Value as JsonValue };
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{ DocumentStore, LazyStore, SearchHit, StoreError, EMBEDDING_FIELDS };

#[derive(Debug, Clone)]
pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub vector_name: Option<String>,
    pub timeout: Duration,
}

pub struct QdrantDocumentStore {
    client: Qdrant,
    collection: String,
    vector_name: Option<String>,
}

impl QdrantDocumentStore {
    pub async fn connect(settings: QdrantSettings) -> Result<Self, StoreError> {
        if settings.url.trim().is_empty() {
            return Err(StoreError::Config("VECTOR_HOST is empty".into()));
        }
        if settings.collection.trim().is_empty() {
            return Err(StoreError::Config("VECTOR_COLLECTION is not set".into()));
        }

        info!(
            "Connecting to Qdrant at {} (collection '{}', api key: {})",
            redact_url(&settings.url),
            settings.collection,
            settings.api_key.is_some()
        );

        let client = Qdrant::from_url(&settings.url)
            .api_key(settings.api_key.clone())
            .timeout(settings.timeout)
            .build()
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let exists = client
            .collection_exists(&settings.collection).await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        if !exists {
            error!("Qdrant collection '{}' not found", settings.collection);
            return Err(StoreError::MissingCollection(settings.collection));
        }

        info!("Qdrant connection fully initialized");
        Ok(Self {
            client,
            collection: settings.collection,
            vector_name: settings.vector_name,
        })
    }

    /// A [`LazyStore`] that connects with `settings` on first use.
    pub fn lazy(settings: QdrantSettings) -> LazyStore {
        LazyStore::new(move || {
            let settings = settings.clone();
            async move {
                let store = Self::connect(settings).await?;
                Ok(Arc::new(store) as Arc<dyn DocumentStore>)
            }
        })
    }
}

#[async_trait]
impl DocumentStore for QdrantDocumentStore {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        let mut request = SearchPointsBuilder::new(
            self.collection.clone(),
            vector.to_vec(),
            limit as u64
        ).with_payload(false);
        if let Some(name) = &self.vector_name {
            request = request.vector_name(name.clone());
        }

        let resp = self.client
            .search_points(request).await
            .map_err(|e| StoreError::Search(e.to_string()))?;

        Ok(
            resp.result
                .into_iter()
                .filter_map(|point| {
                    let id = point.id.and_then(point_id_to_string)?;
                    Some(SearchHit { id, score: point.score })
                })
                .collect()
        )
    }

    async fn fetch(&self, id: &str) -> Result<JsonValue, StoreError> {
        let request = GetPointsBuilder::new(self.collection.clone(), vec![parse_point_id(id)])
            .with_payload(true)
            .with_vectors(false);

        let resp = self.client.get_points(request).await.map_err(|e| StoreError::Fetch {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        let point = resp.result
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut doc = Map::new();
        for (key, value) in point.payload {
            if EMBEDDING_FIELDS.contains(&key.as_str()) {
                continue;
            }
            match serde_json::to_value(value) {
                Ok(json) => {
                    doc.insert(key, json);
                }
                Err(err) => warn!("Skipping field '{}' of document {}: {}", key, id, err),
            }
        }
        Ok(JsonValue::Object(doc))
    }
}

fn point_id_to_string(id: PointId) -> Option<String> {
    match id.point_id_options? {
        PointIdOptions::Num(n) => Some(n.to_string()),
        PointIdOptions::Uuid(uuid) => Some(uuid),
    }
}

fn parse_point_id(id: &str) -> PointId {
    match id.parse::<u64>() {
        Ok(n) => PointId::from(n),
        Err(_) => PointId::from(id.to_string()),
    }
}

/// Strips credentials before a URL is logged.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
