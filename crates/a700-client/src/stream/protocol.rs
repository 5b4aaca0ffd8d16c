//! Engine.IO v4 / Socket.IO v4 text framing.
//!
//! Only the subset a chat client needs: the default namespace, text frames
//! and no acknowledgements.
//!
//! ```text
//! 0{"sid":..,"pingInterval":..}   engine open
//! 2 / 3                           engine ping / pong
//! 40                              socket connect (ack carries {"sid":..})
//! 41                              socket disconnect
//! 42["event",{..}]                socket event
//! 44{"message":..}                socket connect error
//! ```

use serde_json::Value;
use url::Url;

use super::TransportError;

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(Value),
}

impl Packet {
    /// Client-side connect request for the default namespace.
    pub fn connect() -> Self {
        Packet::Message(SocketPacket::Connect(None))
    }

    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Packet::Message(SocketPacket::Event {
            name: name.into(),
            data,
        })
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(v) => format!("0{}", v),
            Packet::Close => "1".to_string(),
            Packet::Ping(p) => format!("2{}", p),
            Packet::Pong(p) => format!("3{}", p),
            Packet::Message(inner) => format!("4{}", inner.encode()),
            Packet::Upgrade => "5".to_string(),
            Packet::Noop => "6".to_string(),
        }
    }

    pub fn decode(frame: &str) -> Result<Self, TransportError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Malformed("empty frame".to_string()))?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping(rest.to_string())),
            '3' => Ok(Packet::Pong(rest.to_string())),
            '4' => Ok(Packet::Message(SocketPacket::decode(rest)?)),
            '5' => Ok(Packet::Upgrade),
            '6' => Ok(Packet::Noop),
            other => Err(TransportError::Malformed(format!(
                "unknown engine packet type {:?}",
                other
            ))),
        }
    }
}

impl SocketPacket {
    fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(v)) => format!("0{}", v),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, data } => {
                format!("2{}", Value::Array(vec![Value::String(name.clone()), data.clone()]))
            }
            SocketPacket::ConnectError(v) => format!("4{}", v),
        }
    }

    fn decode(body: &str) -> Result<Self, TransportError> {
        let mut chars = body.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Malformed("empty socket packet".to_string()))?;
        let payload = strip_ack_id(strip_namespace(chars.as_str()));

        match kind {
            '0' if payload.is_empty() => Ok(SocketPacket::Connect(None)),
            '0' => Ok(SocketPacket::Connect(Some(serde_json::from_str(payload)?))),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let args: Vec<Value> = serde_json::from_str(payload)?;
                let mut args = args.into_iter();
                let name = match args.next() {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(TransportError::Malformed(
                            "event without a name".to_string(),
                        ));
                    }
                };
                Ok(SocketPacket::Event {
                    name,
                    data: args.next().unwrap_or(Value::Null),
                })
            }
            '4' if payload.is_empty() => Ok(SocketPacket::ConnectError(Value::Null)),
            '4' => Ok(SocketPacket::ConnectError(serde_json::from_str(payload)?)),
            other => Err(TransportError::Malformed(format!(
                "unsupported socket packet type {:?}",
                other
            ))),
        }
    }
}

/// `/ns,payload` → `payload`.
fn strip_namespace(s: &str) -> &str {
    if s.starts_with('/') {
        s.split_once(',').map(|(_, rest)| rest).unwrap_or("")
    } else {
        s
    }
}

fn strip_ack_id(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// WebSocket endpoint for the service at `base` (any path is replaced).
pub fn stream_url(base: &Url) -> Result<Url, TransportError> {
    let mut url = base.clone();
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::Connect(format!(
                "unsupported URL scheme: {}",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::Connect("failed to set scheme".to_string()))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_client_packets() {
        assert_eq!(Packet::connect().encode(), "40");
        assert_eq!(Packet::Pong(String::new()).encode(), "3");
        assert_eq!(
            Packet::event("send_chat_message", json!({"agentId": "a"})).encode(),
            r#"42["send_chat_message",{"agentId":"a"}]"#
        );
        assert_eq!(Packet::Message(SocketPacket::Disconnect).encode(), "41");
    }

    #[test]
    fn test_decode_open() {
        let packet = Packet::decode(r#"0{"sid":"abc","pingInterval":25000}"#).unwrap();
        match packet {
            Packet::Open(v) => assert_eq!(v["sid"], "abc"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_ping_and_connect_ack() {
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping(String::new()));
        assert_eq!(
            Packet::decode(r#"40{"sid":"s1"}"#).unwrap(),
            Packet::Message(SocketPacket::Connect(Some(json!({"sid": "s1"}))))
        );
        assert_eq!(
            Packet::decode("40").unwrap(),
            Packet::Message(SocketPacket::Connect(None))
        );
    }

    #[test]
    fn test_decode_event() {
        let packet =
            Packet::decode(r#"42["chat_message_response",{"content":"Hi","finish_reason":null}]"#)
                .unwrap();
        assert_eq!(
            packet,
            Packet::event(
                "chat_message_response",
                json!({"content": "Hi", "finish_reason": null})
            )
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack_id() {
        let packet = Packet::decode(r#"42/chat,17["error","boom"]"#).unwrap();
        assert_eq!(packet, Packet::event("error", json!("boom")));
    }

    #[test]
    fn test_decode_event_without_data() {
        let packet = Packet::decode(r#"42["ping_me"]"#).unwrap();
        assert_eq!(packet, Packet::event("ping_me", Value::Null));
    }

    #[test]
    fn test_decode_connect_error() {
        let packet = Packet::decode(r#"44{"message":"unauthorized"}"#).unwrap();
        assert_eq!(
            packet,
            Packet::Message(SocketPacket::ConnectError(json!({"message": "unauthorized"})))
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Packet::decode("").is_err());
        assert!(Packet::decode("9").is_err());
        assert!(Packet::decode("42{not json").is_err());
        assert!(Packet::decode("42[1,2]").is_err());
    }

    #[test]
    fn test_stream_url() {
        let base = Url::parse("https://api.agent700.ai/api/").unwrap();
        assert_eq!(
            stream_url(&base).unwrap().as_str(),
            "wss://api.agent700.ai/socket.io/?EIO=4&transport=websocket"
        );

        let base = Url::parse("http://localhost:5000/api/").unwrap();
        assert_eq!(
            stream_url(&base).unwrap().as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );

        let base = Url::parse("ftp://example.com").unwrap();
        assert!(stream_url(&base).is_err());
    }
}
