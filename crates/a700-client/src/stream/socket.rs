//! Socket.IO client transport over tokio-tungstenite.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::events::InboundEvent;
use super::protocol::{Packet, SocketPacket, stream_url};
use super::{StreamTransport, TransportError};
use crate::fingerprint;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Streaming transport speaking Socket.IO v4 over a single WebSocket.
pub struct SocketIoTransport {
    url: Url,
    headers: Vec<(String, String)>,
    ws: Option<WsStream>,
}

impl SocketIoTransport {
    /// Transport for the service at `base_url`, authenticating with
    /// `access_token`.
    pub fn new(base_url: &Url, access_token: &str) -> Result<Self, TransportError> {
        let mut headers: Vec<(String, String)> = fingerprint::device_headers()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        headers.push(("Authorization".to_string(), format!("Bearer {}", access_token)));

        Ok(Self {
            url: stream_url(base_url)?,
            headers,
            ws: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }

    async fn handshake(&mut self) -> Result<(), TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| TransportError::Connect(e.to_string()))?;
            request.headers_mut().insert(name, value);
        }

        tracing::debug!(url = %self.url, "opening stream connection");
        let (mut ws, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        // Engine.IO open, then the Socket.IO namespace connect.
        loop {
            match read_packet(&mut ws).await? {
                Some(Packet::Open(info)) => {
                    tracing::debug!(sid = ?info.get("sid"), "engine open");
                    break;
                }
                Some(_) => continue,
                None => return Err(TransportError::Connect("closed during handshake".into())),
            }
        }

        ws.send(Message::text(Packet::connect().encode())).await?;

        loop {
            match read_packet(&mut ws).await? {
                Some(Packet::Message(SocketPacket::Connect(_))) => break,
                Some(Packet::Message(SocketPacket::ConnectError(reason))) => {
                    let reason = reason
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| reason.to_string());
                    return Err(TransportError::Rejected(reason));
                }
                Some(Packet::Ping(payload)) => {
                    ws.send(Message::text(Packet::Pong(payload).encode())).await?;
                }
                Some(_) => continue,
                None => return Err(TransportError::Connect("closed during handshake".into())),
            }
        }

        self.ws = Some(ws);
        Ok(())
    }
}

/// Next protocol packet, answering WebSocket pings on the way.
/// `Ok(None)` once the socket has closed.
async fn read_packet(ws: &mut WsStream) -> Result<Option<Packet>, TransportError> {
    loop {
        let Some(message) = ws.next().await else {
            return Ok(None);
        };
        match message? {
            Message::Text(text) => return Packet::decode(text.as_str()).map(Some),
            Message::Ping(data) => ws.send(Message::Pong(data)).await?,
            Message::Close(_) => return Ok(None),
            Message::Pong(_) | Message::Frame(_) => {}
            Message::Binary(_) => {
                tracing::warn!("ignoring binary stream frame");
            }
        }
    }
}

#[async_trait]
impl StreamTransport for SocketIoTransport {
    async fn connect(&mut self, wait: Duration) -> Result<(), TransportError> {
        tokio::time::timeout(wait, self.handshake())
            .await
            .map_err(|_| TransportError::ConnectTimeout(wait))?
    }

    async fn emit(&mut self, event: &str, data: Value) -> Result<(), TransportError> {
        let ws = self.ws.as_mut().ok_or(TransportError::NotConnected)?;
        ws.send(Message::text(Packet::event(event, data).encode()))
            .await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<InboundEvent>, TransportError> {
        let ws = self.ws.as_mut().ok_or(TransportError::NotConnected)?;
        loop {
            let packet = match read_packet(ws).await {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(None),
                Err(TransportError::Malformed(reason)) => {
                    tracing::warn!(%reason, "skipping malformed packet");
                    continue;
                }
                Err(TransportError::Json(e)) => {
                    tracing::warn!(error = %e, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match packet {
                Packet::Ping(payload) => {
                    ws.send(Message::text(Packet::Pong(payload).encode())).await?;
                }
                Packet::Message(SocketPacket::Event { name, data }) => {
                    match InboundEvent::from_event(&name, data) {
                        Ok(event) => return Ok(Some(event)),
                        Err(e) => {
                            tracing::warn!(event = %name, error = %e, "skipping undecodable event");
                        }
                    }
                }
                Packet::Close | Packet::Message(SocketPacket::Disconnect) => return Ok(None),
                _ => {}
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            let _ = ws
                .send(Message::text(
                    Packet::Message(SocketPacket::Disconnect).encode(),
                ))
                .await;
            let _ = ws.close(None).await;
            tracing::debug!("stream connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_socket_url_and_headers() {
        let base = Url::parse("https://api.agent700.ai/api/").unwrap();
        let transport = SocketIoTransport::new(&base, "tok").unwrap();
        assert_eq!(
            transport.url().as_str(),
            "wss://api.agent700.ai/socket.io/?EIO=4&transport=websocket"
        );
        assert!(!transport.is_connected());
        assert!(
            transport
                .headers
                .iter()
                .any(|(k, v)| k == "Authorization" && v == "Bearer tok")
        );
        assert!(
            transport
                .headers
                .iter()
                .any(|(k, _)| k == "X-Device-Fingerprint")
        );
    }

    #[tokio::test]
    async fn test_emit_requires_connection() {
        let base = Url::parse("http://localhost:1/api/").unwrap();
        let mut transport = SocketIoTransport::new(&base, "tok").unwrap();
        assert!(matches!(
            transport.emit("x", Value::Null).await,
            Err(TransportError::NotConnected)
        ));
        // Disconnecting an unconnected transport is a no-op.
        transport.disconnect().await;
    }
}
