//! HTTP client for the event backend and its connection registry.

use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::timeline::{Event, EventKind, TimeWindow};

pub const DEFAULT_PORT: u16 = 8563;

/// Everything the application asks of the backend.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self, window: TimeWindow, query: &str) -> Result<Vec<Event>>;

    /// Opaque detail document for one event.
    async fn fetch_detail(&self, id: &str) -> Result<serde_json::Value>;

    /// Ask the backend to recompute its statistics.
    async fn flush(&self) -> Result<()>;

    async fn connections(&self) -> Result<ConnectionList>;

    async fn add_connection(&self, connection: &Connection) -> Result<()>;

    async fn update_connection(&self, index: usize, connection: &Connection) -> Result<()>;

    async fn delete_connection(&self, index: usize) -> Result<()>;

    async fn activate_connection(&self, index: usize) -> Result<()>;

    async fn test_connection(&self, connection: &Connection) -> Result<TestResult>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

/// Event as the backend serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(alias = "box_id", deserialize_with = "string_or_number")]
    pub id: String,
    pub group: String,
    pub start_time: f64,
    pub stop_time: f64,
    #[serde(default)]
    pub modifier: String,
    #[serde(default)]
    pub flag: u8,
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        Event {
            kind: EventKind::from_modifier(&raw.modifier),
            id: raw.id,
            group: raw.group,
            modifier: raw.modifier,
            start: raw.start_time,
            stop: raw.stop_time,
            flagged: raw.flag == 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "port_from_any")]
    pub port: u16,
    pub user: String,
    /// Never sent back by the backend; empty when listing.
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl Connection {
    /// `user@host:port`
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConnectionList {
    #[serde(default)]
    pub connections: Vec<Connection>,
    pub active: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

fn port_from_any<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| de::Error::custom(format!("invalid port {n}"))),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(DEFAULT_PORT),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid port {s:?}"))),
        serde_json::Value::Null => Ok(DEFAULT_PORT),
        other => Err(de::Error::custom(format!("invalid port {other}"))),
    }
}

/// [`EventSource`] backed by the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    /// Events endpoint, ending in `/`.
    base: String,
    /// Connection registry, without a trailing `/`.
    connections_base: String,
}

impl HttpApi {
    pub fn new(base: &str, connections_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, base, connections_base))
    }

    pub fn with_client(client: reqwest::Client, base: &str, connections_base: &str) -> Self {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self {
            client,
            base,
            connections_base: connections_base.trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self) -> &str {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn connection_url(&self, path: &str) -> String {
        if path.is_empty() {
            self.connections_base.clone()
        } else {
            format!("{}/{path}", self.connections_base)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: response.url().to_string(),
                status,
            });
        }
        Ok(response)
    }

    async fn json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let body = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl EventSource for HttpApi {
    async fn fetch_events(&self, window: TimeWindow, query: &str) -> Result<Vec<Event>> {
        let request = self.client.get(self.events_url()).query(&[
            ("from", window.start.to_string()),
            ("to", window.stop.to_string()),
            ("q", query.to_string()),
        ]);
        let envelope: Envelope<Vec<RawEvent>> = self.json(request).await?;
        tracing::info!(count = envelope.result.len(), "loaded events");
        Ok(envelope.result.into_iter().map(Event::from).collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<serde_json::Value> {
        let request = self.client.get(self.endpoint("info")).query(&[("id", id)]);
        let envelope: Envelope<serde_json::Value> = self.json(request).await?;
        Ok(envelope.result)
    }

    async fn flush(&self) -> Result<()> {
        self.send(self.client.post(self.endpoint("flush"))).await?;
        tracing::info!("flushed backend statistics");
        Ok(())
    }

    async fn connections(&self) -> Result<ConnectionList> {
        self.json(self.client.get(self.connection_url(""))).await
    }

    async fn add_connection(&self, connection: &Connection) -> Result<()> {
        let request = self.client.post(self.connection_url("")).json(connection);
        self.send(request).await?;
        Ok(())
    }

    async fn update_connection(&self, index: usize, connection: &Connection) -> Result<()> {
        let request = self
            .client
            .put(self.connection_url(&index.to_string()))
            .json(connection);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_connection(&self, index: usize) -> Result<()> {
        let request = self.client.delete(self.connection_url(&index.to_string()));
        self.send(request).await?;
        Ok(())
    }

    async fn activate_connection(&self, index: usize) -> Result<()> {
        let request = self
            .client
            .post(self.connection_url(&format!("{index}/activate")));
        self.send(request).await?;
        tracing::info!(index, "activated connection");
        Ok(())
    }

    async fn test_connection(&self, connection: &Connection) -> Result<TestResult> {
        let request = self.client.post(self.connection_url("test")).json(connection);
        self.json(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn decodes_events_with_either_identifier() {
        let body = r#"{"sql": "select 1", "result": [
            {"box_id": 17, "group": "DQL", "start_time": 10.5, "stop_time": 12.0,
             "modifier": "EVENT_GROUP", "flag": 0},
            {"id": "s-3", "group": "DML", "start_time": 11.0, "stop_time": 11.0,
             "modifier": "DML", "flag": 1}
        ]}"#;
        let envelope: Envelope<Vec<RawEvent>> = serde_json::from_str(body).unwrap();
        let events: Vec<Event> = envelope.result.into_iter().map(Event::from).collect();

        assert_eq!(events[0].id, "17");
        assert_eq!(events[0].kind, EventKind::Aggregate);
        assert!(!events[0].flagged);
        assert_eq!(events[1].id, "s-3");
        assert_eq!(events[1].kind, EventKind::Single);
        assert!(events[1].flagged);
        assert_eq!(events[1].start, events[1].stop);
    }

    #[test]
    fn connection_port_accepts_strings_and_defaults() {
        let list: ConnectionList = serde_json::from_str(
            r#"{"connections": [
                {"name": "a", "host": "h1", "port": "9000", "user": "u"},
                {"name": "b", "host": "h2", "user": "u", "fingerprint": "nocertcheck"},
                {"name": "c", "host": "h3", "port": 8564, "user": "u"}
            ], "active": 1}"#,
        )
        .unwrap();

        assert_eq!(list.active, Some(1));
        assert_eq!(list.connections[0].port, 9000);
        assert_eq!(list.connections[1].port, DEFAULT_PORT);
        assert_eq!(list.connections[2].address(), "u@h3:8564");
    }

    #[test]
    fn urls_are_normalized() {
        let api = HttpApi::with_client(
            reqwest::Client::new(),
            "http://localhost/api/default",
            "http://localhost/api/connections/",
        );
        assert_eq!(api.events_url(), "http://localhost/api/default/");
        assert_eq!(api.endpoint("info"), "http://localhost/api/default/info");
        assert_eq!(
            api.connection_url("2/activate"),
            "http://localhost/api/connections/2/activate"
        );
        assert_eq!(api.connection_url(""), "http://localhost/api/connections");
    }

    /// Serve one canned HTTP response and hand back the request line.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/api/default/"), handle)
    }

    fn local_api(base: &str) -> HttpApi {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpApi::with_client(client, base, "http://127.0.0.1:1/api/connections")
    }

    #[tokio::test]
    async fn fetches_events_over_http() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"result": [{"box_id": "1", "group": "A", "start_time": 1000, "stop_time": 1010, "modifier": "DQL", "flag": 0}]}"#,
        )
        .await;

        let events = local_api(&base)
            .fetch_events(TimeWindow { start: 975.0, stop: 1125.0 }, "select")
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].group, "A");

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /api/default/?from=975&to=1125&q=select "));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (base, server) = serve_once("501 Not Implemented", "{}").await;
        let error = local_api(&base).flush().await.unwrap_err();
        assert!(matches!(error, Error::Status { status, .. } if status.as_u16() == 501));
        assert!(server.await.unwrap().starts_with("POST /api/default/flush "));
    }
}
