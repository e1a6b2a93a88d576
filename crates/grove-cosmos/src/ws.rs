// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Gremlin Server over WebSocket.
//!
//! One connection carries one request at a time. A request is sent as a
//! binary frame; the server answers with zero or more `206` partial batches
//! followed by a final `200`/`204`, or asks for SASL credentials with `407`
//! first.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use grove_client::GraphService;
use grove_proto::gremlin::{RequestMessage, ResponseKind, ResponseMessage};
use grove_proto::{decode_record, PhysicalRequest, ResultRecord, ServiceError, StatusCategory};
use grove_query::ResultShape;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Where and how to reach the Gremlin endpoint.
#[derive(Debug, Clone)]
pub struct GremlinEndpoint {
    /// `ws://` or `wss://` URL.
    pub url: String,
    /// SASL user name (`/dbs/<db>/colls/<coll>`).
    pub username: String,
    /// SASL password (account key).
    pub password: String,
    /// Limit on the WebSocket handshake.
    pub connect_timeout: Duration,
}

/// [`GraphService`] speaking the Gremlin WebSocket protocol.
pub struct GremlinWsService {
    endpoint: GremlinEndpoint,
}

impl GremlinWsService {
    /// Service for `endpoint`.
    pub fn new(endpoint: GremlinEndpoint) -> Self {
        // a provider may already be installed by the host
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self { endpoint }
    }

    /// Target endpoint.
    pub fn endpoint(&self) -> &GremlinEndpoint {
        &self.endpoint
    }
}

/// An open WebSocket to the Gremlin endpoint.
pub struct GremlinConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl GraphService for GremlinWsService {
    type Connection = GremlinConnection;

    async fn connect(&self) -> Result<GremlinConnection, ServiceError> {
        let handshake = connect_async(self.endpoint.url.as_str());
        match tokio::time::timeout(self.endpoint.connect_timeout, handshake).await {
            Ok(Ok((socket, _response))) => {
                debug!(url = %self.endpoint.url, "connected");
                Ok(GremlinConnection { socket })
            }
            Ok(Err(err)) => Err(ServiceError::transport(format!(
                "connect to {} failed: {err}",
                self.endpoint.url
            ))),
            Err(_) => Err(ServiceError::timeout(format!(
                "connect to {} timed out",
                self.endpoint.url
            ))),
        }
    }

    async fn execute(
        &self,
        conn: &mut GremlinConnection,
        request: &PhysicalRequest,
    ) -> Result<Vec<ResultRecord>, ServiceError> {
        let id = request.correlation_id;
        send(conn, &RequestMessage::eval(id, request.gremlin.as_str())).await?;

        let mut collector = ResponseCollector::new(id, request.query.result_shape());
        loop {
            let frame = next_frame(conn).await?;
            let response = match ResponseMessage::from_slice(&frame) {
                Ok(response) => response,
                Err(err) => {
                    return Err(ServiceError::transport(format!(
                        "undecodable response frame: {err}"
                    )))
                }
            };
            match collector.accept(response) {
                Progress::More => {}
                Progress::Done(records) => return Ok(records),
                Progress::Authenticate => {
                    debug!("server requested authentication");
                    let sasl = sasl_plain(&self.endpoint.username, &self.endpoint.password);
                    send(conn, &RequestMessage::authentication(id, sasl)).await?;
                }
                Progress::Failed(err) => return Err(err),
            }
        }
    }
}

async fn send(conn: &mut GremlinConnection, message: &RequestMessage) -> Result<(), ServiceError> {
    let bytes = message
        .to_binary()
        .map_err(|err| ServiceError::new(StatusCategory::BadRequest, err.to_string()))?;
    conn.socket
        .send(Message::Binary(bytes))
        .await
        .map_err(|err| ServiceError::transport(format!("send failed: {err}")))
}

async fn next_frame(conn: &mut GremlinConnection) -> Result<Vec<u8>, ServiceError> {
    loop {
        match conn.socket.next().await {
            Some(Ok(Message::Binary(bytes))) => return Ok(bytes),
            Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
            Some(Ok(Message::Close(frame))) => {
                return Err(ServiceError::transport(format!(
                    "connection closed by server: {frame:?}"
                )))
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(ServiceError::transport(err.to_string())),
            None => return Err(ServiceError::transport("connection closed")),
        }
    }
}

/// SASL PLAIN payload: `\0user\0password`, base64 encoded.
pub fn sasl_plain(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}"))
}

/// What the next response frame did to a request.
#[derive(Debug, PartialEq)]
pub enum Progress {
    /// More frames follow.
    More,
    /// Every batch arrived.
    Done(Vec<ResultRecord>),
    /// Credentials must be sent before the request can continue.
    Authenticate,
    /// The request failed.
    Failed(ServiceError),
}

/// Accumulates the response frames of one request.
#[derive(Debug)]
pub struct ResponseCollector {
    request_id: Uuid,
    shape: ResultShape,
    records: Vec<ResultRecord>,
    authenticated: bool,
}

impl ResponseCollector {
    /// Collector for `request_id`, decoding records as `shape`.
    pub fn new(request_id: Uuid, shape: ResultShape) -> Self {
        Self {
            request_id,
            shape,
            records: Vec::new(),
            authenticated: false,
        }
    }

    /// Feed one response frame.
    pub fn accept(&mut self, response: ResponseMessage) -> Progress {
        if response.request_id.is_some_and(|id| id != self.request_id) {
            warn!(expected = %self.request_id, got = ?response.request_id, "ignoring stray response");
            return Progress::More;
        }
        let kind = response.status.kind();
        trace!(code = response.status.code, "response frame");
        match kind {
            ResponseKind::Partial => {
                self.extend(&response);
                Progress::More
            }
            ResponseKind::Success => {
                self.extend(&response);
                Progress::Done(std::mem::take(&mut self.records))
            }
            ResponseKind::NoContent => Progress::Done(std::mem::take(&mut self.records)),
            ResponseKind::Authenticate if self.authenticated => Progress::Failed(ServiceError::new(
                StatusCategory::Unauthorized,
                "credentials rejected",
            )),
            ResponseKind::Authenticate => {
                self.authenticated = true;
                Progress::Authenticate
            }
            ResponseKind::Failure(err) => Progress::Failed(err),
        }
    }

    fn extend(&mut self, response: &ResponseMessage) {
        let shape = self.shape;
        self.records.extend(
            response
                .records()
                .into_iter()
                .map(|json| ResultRecord::new(decode_record(json, shape))),
        );
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use grove_proto::Value;

    fn frame(id: Uuid, json: &str) -> ResponseMessage {
        let text = json.replace("$ID", &id.to_string());
        ResponseMessage::from_slice(text.as_bytes()).unwrap()
    }

    #[test]
    fn sasl_payload_layout() {
        let encoded = sasl_plain("/dbs/graphdb/colls/Persons", "key");
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"\0/dbs/graphdb/colls/Persons\0key");
    }

    #[test]
    fn partial_batches_accumulate_until_success() {
        let id = Uuid::new_v4();
        let mut c = ResponseCollector::new(id, ResultShape::Plain);
        let partial = r#"{"requestId":"$ID","status":{"code":206},"result":{"data":[1,2]}}"#;
        let last = r#"{"requestId":"$ID","status":{"code":200},"result":{"data":{"@type":"g:List","@value":[{"@type":"g:Int64","@value":3}]}}}"#;
        assert_eq!(c.accept(frame(id, partial)), Progress::More);
        match c.accept(frame(id, last)) {
            Progress::Done(records) => {
                let ints: Vec<_> = records.iter().filter_map(ResultRecord::as_count).collect();
                assert_eq!(ints, vec![1, 2, 3]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_content_finishes_empty() {
        let id = Uuid::new_v4();
        let mut c = ResponseCollector::new(id, ResultShape::Plain);
        let done = r#"{"requestId":"$ID","status":{"code":204}}"#;
        assert_eq!(c.accept(frame(id, done)), Progress::Done(Vec::new()));
    }

    #[test]
    fn authentication_is_attempted_once() {
        let id = Uuid::new_v4();
        let mut c = ResponseCollector::new(id, ResultShape::Plain);
        let challenge = r#"{"requestId":"$ID","status":{"code":407}}"#;
        assert_eq!(c.accept(frame(id, challenge)), Progress::Authenticate);
        assert!(matches!(
            c.accept(frame(id, challenge)),
            Progress::Failed(e) if e.category == StatusCategory::Unauthorized
        ));
    }

    #[test]
    fn throttling_carries_retry_hint() {
        let id = Uuid::new_v4();
        let mut c = ResponseCollector::new(id, ResultShape::Plain);
        let throttled = r#"{"requestId":"$ID","status":{"code":597,"message":"busy",
            "attributes":{"x-ms-status-code":429,"x-ms-retry-after-ms":"00:00:00.5000000"}}}"#;
        match c.accept(frame(id, throttled)) {
            Progress::Failed(err) => {
                assert!(err.is_transient());
                assert_eq!(err.retry_after, Some(Duration::from_millis(500)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stray_frames_are_ignored() {
        let id = Uuid::new_v4();
        let mut c = ResponseCollector::new(id, ResultShape::Plain);
        let other = frame(Uuid::new_v4(), r#"{"requestId":"$ID","status":{"code":200},"result":{"data":["x"]}}"#);
        assert_eq!(c.accept(other), Progress::More);
        let mine = r#"{"requestId":"$ID","status":{"code":200},"result":{"data":["y"]}}"#;
        assert_eq!(
            c.accept(frame(id, mine)),
            Progress::Done(vec![ResultRecord::new(Value::from("y"))])
        );
    }
}
