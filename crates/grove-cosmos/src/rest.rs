// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Document-store management API over HTTPS.
//!
//! Every request is signed with the account master key:
//!
//! ```text
//! sig = base64(HMAC-SHA256(key, "verb\nresourcetype\nresourcelink\ndate\n\n"))
//! Authorization: urlencode("type=master&ver=1.0&sig=" + sig)
//! ```
//!
//! where verb, resource type and date are lowercased and the resource link
//! keeps its case.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use grove_client::{CollectionDescriptor, CollectionSpec, ProvisionError, Provisioner};
use grove_proto::{ServiceError, StatusCategory};
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use url::Url;

use crate::AdapterError;

/// API version sent as `x-ms-version`.
pub const API_VERSION: &str = "2018-12-31";

/// Master-key credentials.
#[derive(Clone)]
pub struct MasterKey {
    key: Vec<u8>,
}

impl MasterKey {
    /// Decode a base64 account key.
    pub fn from_base64(encoded: &str) -> Result<Self, AdapterError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|err| AdapterError::InvalidKey(err.to_string()))?;
        Ok(Self { key })
    }

    /// `Authorization` header value for one request.
    pub fn authorization(
        &self,
        verb: &Method,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.as_str().to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );
        // HMAC accepts keys of any length
        let mut mac = match Hmac::<Sha256>::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(payload.as_bytes());
        let sig = STANDARD.encode(mac.finalize().into_bytes());
        url::form_urlencoded::byte_serialize(format!("type=master&ver=1.0&sig={sig}").as_bytes())
            .collect()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// RFC 1123 date as the service expects it in `x-ms-date`.
pub fn http_date(at: OffsetDateTime) -> String {
    at.to_offset(time::UtcOffset::UTC)
        .format(time::macros::format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))
        .unwrap_or_default()
}

/// Category of an HTTP failure status.
pub fn http_category(status: StatusCode) -> StatusCategory {
    match status.as_u16() {
        400 => StatusCategory::BadRequest,
        401 | 403 => StatusCategory::Unauthorized,
        404 => StatusCategory::NotFound,
        408 => StatusCategory::Timeout,
        409 | 412 => StatusCategory::Conflict,
        429 => StatusCategory::Throttled,
        502..=504 => StatusCategory::Transport,
        _ => StatusCategory::Internal,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PartitionKeyDefinition {
    paths: Vec<String>,
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionResource {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partition_key: Option<PartitionKeyDefinition>,
}

#[derive(Debug, Serialize)]
struct DatabaseResource<'a> {
    id: &'a str,
}

/// [`Provisioner`] for the document-store REST API.
#[derive(Debug, Clone)]
pub struct CosmosRestProvisioner {
    http: reqwest::Client,
    endpoint: Url,
    key: MasterKey,
}

impl CosmosRestProvisioner {
    /// Provisioner for the account at `endpoint` (`https://<account>.documents.azure.com:443/`).
    pub fn new(endpoint: &str, key: MasterKey, timeout: Duration) -> Result<Self, AdapterError> {
        let endpoint =
            Url::parse(endpoint).map_err(|err| AdapterError::InvalidEndpoint(err.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AdapterError::Http(err.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            key,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        resource_type: &str,
        resource_link: &str,
        body: Option<serde_json::Value>,
        throughput: Option<u32>,
    ) -> Result<(StatusCode, serde_json::Value), ServiceError> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|err| ServiceError::new(StatusCategory::BadRequest, err.to_string()))?;
        let date = http_date(OffsetDateTime::now_utc());
        let auth = self
            .key
            .authorization(&method, resource_type, resource_link, &date);
        let mut req = self
            .http
            .request(method.clone(), url)
            .header("authorization", auth)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION);
        if let Some(rus) = throughput {
            req = req.header("x-ms-offer-throughput", rus.to_string());
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        debug!(%method, path, "management request");
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        let retry_after = resp
            .headers()
            .get("x-ms-retry-after-ms")
            .and_then(|v| v.to_str().ok())
            .and_then(grove_proto::gremlin::parse_retry_after);
        let text = resp.text().await.map_err(transport_error)?;
        let json = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT
        {
            return Ok((status, json));
        }
        let message = json
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| status.to_string(), str::to_string);
        Err(ServiceError::new(http_category(status), message).with_retry_after(retry_after))
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::timeout(err.to_string())
    } else {
        ServiceError::transport(err.to_string())
    }
}

fn descriptor(database: &str, json: serde_json::Value) -> Result<CollectionDescriptor, ProvisionError> {
    let resource: CollectionResource = serde_json::from_value(json).map_err(|err| {
        ProvisionError::Service(ServiceError::new(
            StatusCategory::Internal,
            format!("unexpected collection resource: {err}"),
        ))
    })?;
    Ok(CollectionDescriptor {
        database: database.to_string(),
        collection: resource.id,
        partition_key_path: resource
            .partition_key
            .and_then(|pk| pk.paths.into_iter().next()),
        throughput: None,
    })
}

#[async_trait]
impl Provisioner for CosmosRestProvisioner {
    #[instrument(skip(self))]
    async fn read_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Option<CollectionDescriptor>, ProvisionError> {
        let link = format!("dbs/{database}/colls/{collection}");
        let (status, json) = self
            .send(Method::GET, &link, "colls", &link, None, None)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        descriptor(database, json).map(Some)
    }

    #[instrument(skip(self))]
    async fn ensure_database(&self, database: &str) -> Result<(), ProvisionError> {
        let body = serde_json::to_value(DatabaseResource { id: database })
            .map_err(|err| ProvisionError::Service(ServiceError::new(StatusCategory::BadRequest, err.to_string())))?;
        let (status, _) = self
            .send(Method::POST, "dbs", "dbs", "", Some(body), None)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(ProvisionError::Service(ServiceError::new(
                StatusCategory::NotFound,
                "account endpoint not found",
            )));
        }
        // 409: the database already exists
        Ok(())
    }

    #[instrument(skip_all, fields(database = %spec.database, collection = %spec.collection))]
    async fn create_collection(
        &self,
        spec: &CollectionSpec,
    ) -> Result<CollectionDescriptor, ProvisionError> {
        let resource = CollectionResource {
            id: spec.collection.clone(),
            partition_key: spec.partition_key.path().map(|path| PartitionKeyDefinition {
                paths: vec![path],
                kind: "Hash".into(),
            }),
        };
        let body = serde_json::to_value(&resource)
            .map_err(|err| ProvisionError::Service(ServiceError::new(StatusCategory::BadRequest, err.to_string())))?;
        let db_link = format!("dbs/{}", spec.database);
        let (status, json) = self
            .send(
                Method::POST,
                &format!("{db_link}/colls"),
                "colls",
                &db_link,
                Some(body),
                Some(spec.throughput),
            )
            .await?;
        match status {
            StatusCode::CONFLICT => Err(ProvisionError::AlreadyExists {
                resource: format!("{db_link}/colls/{}", spec.collection),
            }),
            StatusCode::NOT_FOUND => Err(ProvisionError::Service(ServiceError::new(
                StatusCategory::NotFound,
                format!("database {} does not exist", spec.database),
            ))),
            _ => {
                let mut created = descriptor(&spec.database, json)?;
                created.throughput = Some(spec.throughput);
                Ok(created)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn date_is_rfc1123() {
        assert_eq!(
            http_date(datetime!(2017-04-27 00:51:12 UTC)),
            "Thu, 27 Apr 2017 00:51:12 GMT"
        );
    }

    #[test]
    fn token_signs_the_lowercased_payload() {
        let key = MasterKey::from_base64("c2VjcmV0LWFjY291bnQta2V5").unwrap();
        let date = "Thu, 27 Apr 2017 00:51:12 GMT";
        let token = key.authorization(&Method::GET, "dbs", "dbs/ToDoList", date);

        let decoded: String = url::form_urlencoded::parse(format!("x={token}").as_bytes())
            .map(|(_, v)| v.into_owned())
            .collect();
        let sig = decoded
            .strip_prefix("type=master&ver=1.0&sig=")
            .unwrap();

        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret-account-key").unwrap();
        mac.update(b"get\ndbs\ndbs/ToDoList\nthu, 27 apr 2017 00:51:12 gmt\n\n");
        assert_eq!(sig, STANDARD.encode(mac.finalize().into_bytes()));
        assert!(!token.contains('='));
        assert!(!token.contains('&'));
    }

    #[test]
    fn signing_is_case_insensitive_on_verb_and_type() {
        let key = MasterKey::from_base64("a2V5").unwrap();
        let date = "Thu, 27 Apr 2017 00:51:12 GMT";
        assert_eq!(
            key.authorization(&Method::POST, "COLLS", "dbs/graphdb", date),
            key.authorization(&Method::POST, "colls", "dbs/graphdb", date)
        );
        assert_ne!(
            key.authorization(&Method::POST, "colls", "dbs/graphdb", date),
            key.authorization(&Method::POST, "colls", "dbs/GraphDb", date)
        );
    }

    #[test]
    fn invalid_key_is_rejected() {
        assert!(matches!(
            MasterKey::from_base64("not base64!"),
            Err(AdapterError::InvalidKey(_))
        ));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(http_category(StatusCode::TOO_MANY_REQUESTS), StatusCategory::Throttled);
        assert_eq!(http_category(StatusCode::FORBIDDEN), StatusCategory::Unauthorized);
        assert_eq!(http_category(StatusCode::SERVICE_UNAVAILABLE), StatusCategory::Transport);
        assert_eq!(http_category(StatusCode::INTERNAL_SERVER_ERROR), StatusCategory::Internal);
    }

    #[test]
    fn collection_resource_decoding() {
        let json = serde_json::json!({
            "id": "Persons",
            "partitionKey": { "paths": ["/firstName"], "kind": "Hash" },
            "_rid": "abc"
        });
        let desc = descriptor("graphdb", json).unwrap();
        assert_eq!(desc.partition_key_path.as_deref(), Some("/firstName"));
        let flat = descriptor("graphdb", serde_json::json!({ "id": "Persons" })).unwrap();
        assert_eq!(flat.partition_key_path, None);
    }
}
