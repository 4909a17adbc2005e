use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

pub const DEFAULT_NAMESPACE: &str = "/";

/// Body of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Socket.IO v5 over Engine.IO v4 text frames. One WebSocket text frame is one
/// Engine.IO packet; type `4` wraps a Socket.IO packet. Binary attachments are
/// not used by the gateway and ack ids are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    // Engine.IO
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Noop,
    // Socket.IO
    Connect { namespace: String, data: Option<Value> },
    Disconnect { namespace: String },
    ConnectError { namespace: String, data: Value },
    Event { namespace: String, name: String, args: Vec<Value> },
}

impl Packet {
    /// Namespace connect for the default namespace.
    pub fn connect() -> Self {
        Packet::Connect { namespace: DEFAULT_NAMESPACE.into(), data: None }
    }

    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Packet::Event { namespace: DEFAULT_NAMESPACE.into(), name: name.into(), args }
    }
}

fn protocol(msg: impl Into<String>) -> ClientError {
    ClientError::Protocol(msg.into())
}

pub fn decode(frame: &str) -> Result<Packet> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or_else(|| protocol("empty frame"))?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping(rest.to_string())),
        '3' => Ok(Packet::Pong(rest.to_string())),
        '4' => decode_socket(rest),
        '6' => Ok(Packet::Noop),
        other => Err(protocol(format!("unknown engine packet type {other:?}"))),
    }
}

fn decode_socket(frame: &str) -> Result<Packet> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or_else(|| protocol("empty socket packet"))?;
    let (namespace, body) = split_namespace(chars.as_str());

    match kind {
        '0' => {
            let data = if body.is_empty() { None } else { Some(serde_json::from_str(body)?) };
            Ok(Packet::Connect { namespace, data })
        }
        '1' => Ok(Packet::Disconnect { namespace }),
        '2' => {
            // An ack id may precede the payload; it is not used here.
            let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut items: Vec<Value> = serde_json::from_str(body)?;
            if items.is_empty() {
                return Err(protocol("event without a name"));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => return Err(protocol(format!("event name must be a string, got {other}"))),
            };
            Ok(Packet::Event { namespace, name, args: items })
        }
        '4' => {
            let data = if body.is_empty() { Value::Null } else { serde_json::from_str(body)? };
            Ok(Packet::ConnectError { namespace, data })
        }
        other => Err(protocol(format!("unsupported socket packet type {other:?}"))),
    }
}

/// `/chat,{...}` -> (`/chat`, `{...}`); anything without a leading slash is
/// on the default namespace.
fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.split_once(',') {
        Some((namespace, body)) => (namespace.to_string(), body),
        None => (rest.to_string(), ""),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

pub fn encode(packet: &Packet) -> Result<String> {
    let frame = match packet {
        Packet::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
        Packet::Close => "1".to_string(),
        Packet::Ping(data) => format!("2{data}"),
        Packet::Pong(data) => format!("3{data}"),
        Packet::Noop => "6".to_string(),
        Packet::Connect { namespace, data } => {
            let body = match data {
                Some(data) => serde_json::to_string(data)?,
                None => String::new(),
            };
            format!("40{}{body}", namespace_prefix(namespace))
        }
        Packet::Disconnect { namespace } => format!("41{}", namespace_prefix(namespace)),
        Packet::ConnectError { namespace, data } => {
            format!("44{}{}", namespace_prefix(namespace), serde_json::to_string(data)?)
        }
        Packet::Event { namespace, name, args } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            format!("42{}{}", namespace_prefix(namespace), serde_json::to_string(&items)?)
        }
    };
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_engine_packets() {
        let open = decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#)
            .unwrap();
        match open {
            Packet::Open(handshake) => {
                assert_eq!(handshake.sid, "abc");
                assert_eq!(handshake.ping_interval, 25000);
                assert_eq!(handshake.max_payload, Some(1_000_000));
            }
            other => panic!("expected open, got {other:?}"),
        }

        assert_eq!(decode("1").unwrap(), Packet::Close);
        assert_eq!(decode("2").unwrap(), Packet::Ping(String::new()));
        assert_eq!(decode("3ping").unwrap(), Packet::Pong("ping".into()));
        assert_eq!(decode("6").unwrap(), Packet::Noop);
    }

    #[test]
    fn test_decode_socket_packets() {
        assert_eq!(
            decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Packet::Connect { namespace: "/".into(), data: Some(json!({ "sid": "xyz" })) }
        );
        assert_eq!(decode("41").unwrap(), Packet::Disconnect { namespace: "/".into() });
        assert_eq!(
            decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::ConnectError { namespace: "/".into(), data: json!({ "message": "Not authorized" }) }
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack_id() {
        assert_eq!(
            decode(r#"42["newMessage",{"receiverId":"u2"}]"#).unwrap(),
            Packet::event("newMessage", vec![json!({ "receiverId": "u2" })])
        );
        assert_eq!(
            decode(r#"42/admin,7["ping",1]"#).unwrap(),
            Packet::Event { namespace: "/admin".into(), name: "ping".into(), args: vec![json!(1)] }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("").is_err());
        assert!(decode("9").is_err());
        assert!(decode("42[]").is_err());
        assert!(decode("42[1,2]").is_err());
        assert!(decode("43[]").is_err());
        assert!(decode("42not json").is_err());
    }

    #[test]
    fn test_encode_client_frames() {
        assert_eq!(encode(&Packet::connect()).unwrap(), "40");
        assert_eq!(encode(&Packet::Pong(String::new())).unwrap(), "3");
        assert_eq!(
            encode(&Packet::event("hello", vec![json!({ "a": 1 })])).unwrap(),
            r#"42["hello",{"a":1}]"#
        );
        assert_eq!(encode(&Packet::Disconnect { namespace: "/".into() }).unwrap(), "41");
    }
}
