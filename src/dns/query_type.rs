//! Record type definitions and conversions

use serde_derive::{Deserialize, Serialize};

/// `QueryType` represents the record types a client can ask for.
///
/// The registry is fixed: these four types and nothing else. A type name can
/// be converted to a querytype using the `from_name` function, and back to its
/// name using the `name` method. The one-hot wire codes are available through
/// `to_num` and `from_num`.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy, Serialize, Deserialize)]
pub enum QueryType {
    A,     // 0b1000
    Aaaa,  // 0b0100
    Cname, // 0b0010
    Ns,    // 0b0001
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::A => 0b1000,
            QueryType::Aaaa => 0b0100,
            QueryType::Cname => 0b0010,
            QueryType::Ns => 0b0001,
        }
    }

    pub fn from_num(num: u16) -> Option<QueryType> {
        match num {
            0b1000 => Some(QueryType::A),
            0b0100 => Some(QueryType::Aaaa),
            0b0010 => Some(QueryType::Cname),
            0b0001 => Some(QueryType::Ns),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            QueryType::A => "A",
            QueryType::Aaaa => "AAAA",
            QueryType::Cname => "CNAME",
            QueryType::Ns => "NS",
        }
    }

    /// Validates a user-supplied type name. The caller is expected to have
    /// uppercased the input already.
    pub fn from_name(name: &str) -> Option<QueryType> {
        match name {
            "A" => Some(QueryType::A),
            "AAAA" => Some(QueryType::Aaaa),
            "CNAME" => Some(QueryType::Cname),
            "NS" => Some(QueryType::Ns),
            _ => None,
        }
    }
}
