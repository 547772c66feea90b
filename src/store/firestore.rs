//! Firestore REST v1 backend.
//!
//! Uses `:runQuery` for the dedup query and `:commit` for every write, so a
//! batch of creates is applied atomically and counters use the native
//! `increment` transform instead of a read-modify-write.

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Map, Value, json};
use snafu::prelude::*;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::emit;
use crate::error::{StoreDecodeSnafu, StoreError, StoreStatusSnafu, StoreTransportSnafu};
use crate::metrics::events::{RequestStatus, StoreOperation, StoreRequest};

use super::{Document, DocumentStore, FieldValue};

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

static SIMPLE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex pattern"));

/// Document store backed by the Firestore REST API.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: Client,
    endpoint: String,
    /// `projects/{project}/databases/{database}/documents`
    root: String,
    access_token: Option<String>,
    stats_collection: String,
    stats_document: String,
}

impl FirestoreStore {
    pub fn new(config: &StoreConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let endpoint = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        let project = config.project_id.as_deref().unwrap_or_default();

        Ok(Self {
            client,
            endpoint,
            root: format!("projects/{project}/databases/{}/documents", config.database),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
            stats_collection: config.stats_collection.clone(),
            stats_document: config.stats_document.clone(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/v1/{}{}", self.endpoint, self.root, suffix)
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.root, collection, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, record it, and return the decoded JSON body.
    async fn send(
        &self,
        operation: StoreOperation,
        request: RequestBuilder,
    ) -> Result<Value, StoreError> {
        let start = Instant::now();
        let result = self.send_inner(request).await;
        emit!(StoreRequest {
            operation,
            status: if result.is_ok() {
                RequestStatus::Success
            } else {
                RequestStatus::Error
            },
            duration: start.elapsed(),
        });
        result
    }

    async fn send_inner(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .context(StoreTransportSnafu)?;

        let status = response.status();
        let body = response.text().await.context(StoreTransportSnafu)?;
        ensure!(
            status.is_success(),
            StoreStatusSnafu {
                status: status.as_u16(),
                body,
            }
        );

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).context(StoreDecodeSnafu)
    }

    async fn commit_writes(
        &self,
        operation: StoreOperation,
        writes: Vec<Value>,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.url(":commit"))
            .json(&json!({ "writes": writes }));
        self.send(operation, request).await.map(|_| ())
    }

    /// A create-only write for a new document with a generated id.
    fn create_write(&self, collection: &str, document: &Document) -> Value {
        let mut fields = Map::new();
        let mut transforms = Vec::new();
        for (name, value) in &document.fields {
            match value {
                FieldValue::ServerTimestamp => transforms.push(json!({
                    "fieldPath": field_path(name),
                    "setToServerValue": "REQUEST_TIME",
                })),
                other => {
                    fields.insert(name.clone(), encode_value(other));
                }
            }
        }

        let mut write = json!({
            "update": {
                "name": self.document_name(collection, &Uuid::new_v4().simple().to_string()),
                "fields": fields,
            },
            "currentDocument": { "exists": false },
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = Value::Array(transforms);
        }
        write
    }
}

/// Encode a value in Firestore's typed JSON representation.
fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => json!({ "stringValue": s }),
        // int64 values are carried as strings
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Timestamp(ts) => json!({ "timestampValue": ts.to_rfc3339() }),
        FieldValue::ServerTimestamp => Value::Null,
    }
}

/// Quote a field name that is not a plain identifier.
fn field_path(name: &str) -> String {
    if SIMPLE_FIELD.is_match(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn probe(&self) -> Result<(), StoreError> {
        let request = self.client.get(self.url(&format!(
            "/{}/{}",
            self.stats_collection, self.stats_document
        )));
        match self.send(StoreOperation::Query, request).await {
            Ok(_) => Ok(()),
            // A fresh database has no counter document yet.
            Err(StoreError::StoreStatus { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn exists(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field_path(field) },
                        "op": "EQUAL",
                        "value": { "stringValue": value },
                    }
                },
                "limit": 1,
            }
        });
        let request = self.client.post(self.url(":runQuery")).json(&query);
        let response = self.send(StoreOperation::Query, request).await?;

        // One element per result, plus elements carrying only a readTime.
        Ok(response
            .as_array()
            .is_some_and(|items| items.iter().any(|item| item.get("document").is_some())))
    }

    async fn commit(&self, collection: &str, documents: &[Document]) -> Result<(), StoreError> {
        if documents.is_empty() {
            return Ok(());
        }
        let writes = documents
            .iter()
            .map(|doc| self.create_write(collection, doc))
            .collect();
        debug!(collection, documents = documents.len(), "Committing batch");
        self.commit_writes(StoreOperation::Commit, writes).await
    }

    async fn create(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let write = self.create_write(collection, &document);
        self.commit_writes(StoreOperation::Create, vec![write]).await
    }

    async fn increment(
        &self,
        collection: &str,
        document: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        let write = json!({
            "transform": {
                "document": self.document_name(collection, document),
                "fieldTransforms": [{
                    "fieldPath": field_path(field),
                    "increment": { "integerValue": delta.to_string() },
                }],
            }
        });
        self.commit_writes(StoreOperation::Increment, vec![write])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FirestoreStore {
        FirestoreStore::new(&StoreConfig {
            project_id: Some("brezhoneg".to_string()),
            endpoint: Some("http://localhost:8080/".to_string()),
            ..StoreConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls_and_names() {
        let store = store();
        assert_eq!(
            store.url(":commit"),
            "http://localhost:8080/v1/projects/brezhoneg/databases/(default)/documents:commit"
        );
        assert_eq!(
            store.document_name("stats", "global"),
            "projects/brezhoneg/databases/(default)/documents/stats/global"
        );
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("br"), "br");
        assert_eq!(field_path("created_at"), "created_at");
        assert_eq!(field_path("source-text"), "`source-text`");
        assert_eq!(field_path("a`b"), "`a\\`b`");
    }

    #[test]
    fn test_create_write_shape() {
        let store = store();
        let doc = Document::new()
            .with("br", "Demat")
            .with("attempts", 2i64)
            .with("timestamp", FieldValue::ServerTimestamp);
        let write = store.create_write("to_retry", &doc);

        let name = write["update"]["name"].as_str().unwrap();
        assert!(name.starts_with("projects/brezhoneg/databases/(default)/documents/to_retry/"));
        assert_eq!(write["update"]["fields"]["br"]["stringValue"], "Demat");
        assert_eq!(write["update"]["fields"]["attempts"]["integerValue"], "2");
        assert!(write["update"]["fields"].get("timestamp").is_none());
        assert_eq!(write["updateTransforms"][0]["fieldPath"], "timestamp");
        assert_eq!(
            write["updateTransforms"][0]["setToServerValue"],
            "REQUEST_TIME"
        );
        assert_eq!(write["currentDocument"]["exists"], false);
    }

    #[test]
    fn test_access_token_is_optional() {
        let store = FirestoreStore::new(&StoreConfig {
            project_id: Some("p".to_string()),
            access_token: Some(String::new()),
            ..StoreConfig::default()
        })
        .unwrap();
        assert!(store.access_token.is_none());
        assert!(store.endpoint.starts_with("https://firestore.googleapis.com"));
    }
}
