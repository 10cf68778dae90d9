//! implements the query/response envelope in a transport agnostic fashion
//!
//! The wire format is a JSON document per datagram. A query carries a 32 bit
//! correlation id, the query flag marker and a question; a response echoes the
//! id, carries the response flag marker and an answer. Any payload that does
//! not decode into the response shape is a distinguishable error, never a
//! silent default.

use derive_more::{Display, Error, From};
use serde_derive::{Deserialize, Serialize};

#[derive(Debug, Display, From, Error)]
pub enum ProtocolError {
    Json(serde_json::Error),
    Io(std::io::Error),
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// Sentinel result carried by a response whose name/type has no record.
pub const NOT_FOUND: &str = "Record not found";

/// TTL assumed for an answer that arrives without one.
pub const DEFAULT_TTL: u32 = 60;

/// Marks an envelope as a query or a response.
///
/// The on-wire markers are four-character strings, not booleans.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum PacketFlag {
    #[serde(rename = "0000")]
    Query,
    #[serde(rename = "0001")]
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub name: String,
    #[serde(rename = "type")]
    pub qtype: String,
}

/// The answer payload of a response envelope.
///
/// `result` defaults to the not-found sentinel and `ttl` to the wire default
/// when the peer omits them; `name` and `type` are required, so a response
/// without a usable answer body fails decoding instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub name: String,
    #[serde(rename = "type")]
    pub qtype: String,
    #[serde(default = "default_result")]
    pub result: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl Answer {
    /// True for a negative answer: the peer resolved the question to "no such
    /// record". A legitimate outcome, never an error.
    pub fn is_not_found(&self) -> bool {
        self.result == NOT_FOUND
    }
}

fn default_result() -> String {
    NOT_FOUND.to_string()
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

/// The outgoing envelope: `{ id, flag, question }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPacket {
    pub id: u32,
    pub flag: PacketFlag,
    pub question: Question,
}

impl QueryPacket {
    pub fn new(id: u32, qname: &str, qtype: &str) -> QueryPacket {
        QueryPacket {
            id,
            flag: PacketFlag::Query,
            question: Question {
                name: qname.to_string(),
                qtype: qtype.to_string(),
            },
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let encoded = serde_json::to_vec(self)?;
        Ok(encoded)
    }
}

/// The incoming envelope: `{ id, flag, answer }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePacket {
    pub id: u32,
    pub flag: PacketFlag,
    pub answer: Answer,
}

impl ResponsePacket {
    pub fn from_bytes(payload: &[u8]) -> Result<ResponsePacket> {
        let decoded = serde_json::from_slice(payload)?;
        Ok(decoded)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let encoded = serde_json::to_vec(self)?;
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_wire_shape() {
        let packet = QueryPacket::new(0xDEAD_BEEF, "shop.amazon.com", "A");
        let value: serde_json::Value =
            serde_json::from_slice(&packet.to_bytes().unwrap()).unwrap();

        assert_eq!(value["id"], 0xDEAD_BEEFu32);
        assert_eq!(value["flag"], "0000");
        assert_eq!(value["question"]["name"], "shop.amazon.com");
        assert_eq!(value["question"]["type"], "A");
    }

    #[test]
    fn test_response_decode() {
        let raw = br#"{"id":7,"flag":"0001","answer":{"name":"e.com","type":"A","result":"1.2.3.4","ttl":5}}"#;
        let packet = ResponsePacket::from_bytes(raw).unwrap();

        assert_eq!(7, packet.id);
        assert_eq!(PacketFlag::Response, packet.flag);
        assert_eq!("1.2.3.4", packet.answer.result);
        assert_eq!(5, packet.answer.ttl);
        assert!(!packet.answer.is_not_found());
    }

    #[test]
    fn test_response_defaults() {
        // A peer may omit ttl and result; the envelope fills the wire defaults
        let raw = br#"{"id":1,"flag":"0001","answer":{"name":"d.com","type":"A"}}"#;
        let packet = ResponsePacket::from_bytes(raw).unwrap();

        assert_eq!(DEFAULT_TTL, packet.answer.ttl);
        assert!(packet.answer.is_not_found());
    }

    #[test]
    fn test_query_flag_retained_on_decode() {
        // A mis-flagged reply still decodes; rejecting it is the caller's job
        let raw = br#"{"id":1,"flag":"0000","answer":{"name":"a.com","type":"A","result":"1.1.1.1","ttl":9}}"#;
        let packet = ResponsePacket::from_bytes(raw).unwrap();
        assert_eq!(PacketFlag::Query, packet.flag);
    }

    #[test]
    fn test_decode_failure_is_an_error() {
        assert!(ResponsePacket::from_bytes(b"not json at all").is_err());
        assert!(ResponsePacket::from_bytes(br#"{"id":1,"flag":"0001"}"#).is_err());
        assert!(ResponsePacket::from_bytes(br#"{"id":1,"flag":"0009","answer":{"name":"a","type":"A"}}"#).is_err());
    }
}
