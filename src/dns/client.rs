//! client for sending queries to the resolver peer
//!
//! One transaction per cache miss: build an envelope with a fresh correlation
//! id, fire it at the peer, then block on exactly one receive bounded by the
//! configured timeout. A reply only counts as an answer when it decodes, its
//! id matches what was sent and its flag marks it as a response; everything
//! else is discarded as a miss.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use chrono::Utc;
use derive_more::{Display, Error, From};

use crate::dns::protocol::{Answer, PacketFlag, QueryPacket, ResponsePacket};

#[derive(Debug, Display, From, Error)]
pub enum ClientError {
    Protocol(crate::dns::protocol::ProtocolError),
    Io(std::io::Error),
    TimeOut,
}

type Result<T> = std::result::Result<T, ClientError>;

/// Largest datagram the client will accept.
const MAX_PACKET_SIZE: usize = 4096;

/// The transport collaborator underneath the transaction: an unreliable,
/// unordered, message-oriented channel. The core never binds a well-known
/// port or listens; it is purely a client of this seam.
///
/// `receive` reports an elapsed timeout as `ClientError::TimeOut`; any other
/// failure is a transport fault and surfaces as `ClientError::Io`.
pub trait Transport {
    fn send(&self, payload: &[u8], peer: SocketAddr) -> Result<()>;
    fn receive(&self, timeout: Duration) -> Result<(Vec<u8>, SocketAddr)>;
}

/// UDP transport on a socket bound to an ephemeral local port.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn new() -> Result<UdpTransport> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| {
            log::error!("failed to bind client UDP socket: {}", e);
            ClientError::Io(e)
        })?;

        if let Ok(local_addr) = socket.local_addr() {
            log::debug!("client bound to dynamically assigned port {}", local_addr.port());
        }

        Ok(UdpTransport { socket })
    }
}

impl Transport for UdpTransport {
    fn send(&self, payload: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(payload, peer)?;

        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<(Vec<u8>, SocketAddr)> {
        self.socket.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8; MAX_PACKET_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((len, peer)) => Ok((buf[..len].to_vec(), peer)),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Err(ClientError::TimeOut)
            }
            Err(e) => Err(ClientError::Io(e)),
        }
    }
}

/// Terminal states of one query transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// A correlated response was decoded; carries its answer payload.
    Answered(Answer),
    /// Nothing arrived before the deadline. Not retried.
    TimedOut,
    /// A reply arrived but failed decoding, or was not the response to the
    /// query we sent. Discarded without a second receive.
    Rejected,
}

/// Correlation id for an outgoing query: the current millisecond timestamp
/// truncated to 32 bits. Collisions are possible and accepted; the id only
/// has to match within the single outstanding transaction.
fn next_correlation_id() -> u32 {
    Utc::now().timestamp_millis() as u32
}

/// Runs one query transaction against `peer`: build, send, one bounded
/// receive, classify. Transport faults propagate as errors; every
/// protocol-level failure folds into the returned outcome.
pub fn run_query(
    transport: &dyn Transport,
    peer: SocketAddr,
    qname: &str,
    qtype: &str,
    timeout: Duration,
) -> Result<TransactionOutcome> {
    let id = next_correlation_id();
    let packet = QueryPacket::new(id, qname, qtype);

    transport.send(&packet.to_bytes()?, peer)?;

    let (reply, _peer) = match transport.receive(timeout) {
        Ok(x) => x,
        Err(ClientError::TimeOut) => {
            log::info!("no response for {} {} within {:?}", qname, qtype, timeout);
            return Ok(TransactionOutcome::TimedOut);
        }
        Err(e) => return Err(e),
    };

    let response = match ResponsePacket::from_bytes(&reply) {
        Ok(response) => response,
        Err(err) => {
            log::info!("discarding undecodable reply: {}", err);
            return Ok(TransactionOutcome::Rejected);
        }
    };

    if response.id != id || response.flag != PacketFlag::Response {
        log::info!(
            "discarding mismatched reply (id {} vs {}, flag {:?})",
            response.id,
            id,
            response.flag
        );
        return Ok(TransactionOutcome::Rejected);
    }

    Ok(TransactionOutcome::Answered(response.answer))
}

#[cfg(test)]
pub mod tests {

    use std::sync::Mutex;

    use super::*;
    use crate::dns::protocol::NOT_FOUND;

    pub type ReplyCallback = dyn Fn(&[u8]) -> Result<(Vec<u8>, SocketAddr)>;

    /// Transport stub: records what was sent and lets the test fabricate the
    /// reply from it.
    pub struct StubTransport {
        sent: Mutex<Vec<Vec<u8>>>,
        callback: Box<ReplyCallback>,
    }

    impl StubTransport {
        pub fn new(callback: Box<ReplyCallback>) -> StubTransport {
            StubTransport {
                sent: Mutex::new(Vec::new()),
                callback,
            }
        }
    }

    unsafe impl Send for StubTransport {}
    unsafe impl Sync for StubTransport {}

    impl Transport for StubTransport {
        fn send(&self, payload: &[u8], _peer: SocketAddr) -> Result<()> {
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(())
        }

        fn receive(&self, _timeout: Duration) -> Result<(Vec<u8>, SocketAddr)> {
            let sent = self.sent.lock().unwrap();
            let last = sent.last().expect("receive before send");
            (self.callback)(last)
        }
    }

    pub fn test_peer() -> SocketAddr {
        "127.0.0.1:21000".parse().unwrap()
    }

    /// Builds a response to the raw query payload, optionally mangling the id
    /// or flag on the way out.
    fn respond(query: &[u8], result: &str, ttl: u32, id_offset: u32, flag: PacketFlag) -> (Vec<u8>, SocketAddr) {
        let query: QueryPacket = serde_json::from_slice(query).unwrap();
        let response = ResponsePacket {
            id: query.id.wrapping_add(id_offset),
            flag,
            answer: Answer {
                name: query.question.name.clone(),
                qtype: query.question.qtype.clone(),
                result: result.to_string(),
                ttl,
            },
        };
        (response.to_bytes().unwrap(), test_peer())
    }

    #[test]
    fn test_answered() {
        let transport = StubTransport::new(Box::new(|query| {
            Ok(respond(query, "1.2.3.4", 5, 0, PacketFlag::Response))
        }));

        let outcome =
            run_query(&transport, test_peer(), "e.com", "A", Duration::from_secs(5)).unwrap();

        match outcome {
            TransactionOutcome::Answered(answer) => {
                assert_eq!("e.com", answer.name);
                assert_eq!("1.2.3.4", answer.result);
                assert_eq!(5, answer.ttl);
            }
            other => panic!("expected Answered, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_answer_is_still_answered() {
        let transport = StubTransport::new(Box::new(|query| {
            Ok(respond(query, NOT_FOUND, 60, 0, PacketFlag::Response))
        }));

        let outcome =
            run_query(&transport, test_peer(), "d.com", "A", Duration::from_secs(5)).unwrap();

        match outcome {
            TransactionOutcome::Answered(answer) => assert!(answer.is_not_found()),
            other => panic!("expected Answered, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout() {
        let transport = StubTransport::new(Box::new(|_| Err(ClientError::TimeOut)));

        let outcome =
            run_query(&transport, test_peer(), "c.com", "A", Duration::from_secs(5)).unwrap();

        assert_eq!(TransactionOutcome::TimedOut, outcome);
    }

    #[test]
    fn test_mismatched_id_rejected() {
        let transport = StubTransport::new(Box::new(|query| {
            Ok(respond(query, "1.2.3.4", 5, 1, PacketFlag::Response))
        }));

        let outcome =
            run_query(&transport, test_peer(), "a.com", "A", Duration::from_secs(5)).unwrap();

        assert_eq!(TransactionOutcome::Rejected, outcome);
    }

    #[test]
    fn test_wrong_flag_rejected() {
        let transport = StubTransport::new(Box::new(|query| {
            Ok(respond(query, "1.2.3.4", 5, 0, PacketFlag::Query))
        }));

        let outcome =
            run_query(&transport, test_peer(), "a.com", "A", Duration::from_secs(5)).unwrap();

        assert_eq!(TransactionOutcome::Rejected, outcome);
    }

    #[test]
    fn test_undecodable_reply_rejected() {
        let transport =
            StubTransport::new(Box::new(|_| Ok((b"garbage".to_vec(), test_peer()))));

        let outcome =
            run_query(&transport, test_peer(), "a.com", "A", Duration::from_secs(5)).unwrap();

        assert_eq!(TransactionOutcome::Rejected, outcome);
    }

    #[test]
    fn test_transport_fault_propagates() {
        let transport = StubTransport::new(Box::new(|_| {
            Err(ClientError::Io(std::io::Error::new(
                ErrorKind::ConnectionReset,
                "peer socket not up",
            )))
        }));

        let result = run_query(&transport, test_peer(), "a.com", "A", Duration::from_secs(5));

        assert!(matches!(result, Err(ClientError::Io(_))));
    }
}
