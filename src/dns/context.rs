//! The `ClientContext` holds the common state across one client session

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use derive_more::{Display, Error, From};

use crate::dns::cache::RecordCache;
use crate::dns::client::{Transport, UdpTransport};

#[derive(Debug, Display, From, Error)]
pub enum ContextError {
    Client(crate::dns::client::ClientError),
    Cache(crate::dns::cache::CacheError),
    Io(std::io::Error),
}

type Result<T> = std::result::Result<T, ContextError>;

/// Receive timeout used when the caller does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ClientStatistics {
    pub queries_sent: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub failed_transactions: AtomicUsize,
}

impl ClientStatistics {
    pub fn new() -> ClientStatistics {
        ClientStatistics {
            queries_sent: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            failed_transactions: AtomicUsize::new(0),
        }
    }

    pub fn get_queries_sent(&self) -> usize {
        self.queries_sent.load(Ordering::Acquire)
    }

    pub fn get_cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Acquire)
    }

    pub fn get_failed_transactions(&self) -> usize {
        self.failed_transactions.load(Ordering::Acquire)
    }
}

impl Default for ClientStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration and shared state for the lookup client: the record cache,
/// the transport, the resolver peer address and the session counters.
pub struct ClientContext {
    pub cache: RecordCache,
    pub transport: Box<dyn Transport + Send + Sync>,
    pub peer: SocketAddr,
    pub receive_timeout: Duration,
    pub statistics: ClientStatistics,
}

impl ClientContext {
    /// Builds a context over a fresh UDP transport and starts the cache decay
    /// thread.
    pub fn new(peer: SocketAddr, receive_timeout: Duration) -> Result<Arc<ClientContext>> {
        let transport = Box::new(UdpTransport::new()?);
        let context = Self::with_transport(transport, peer, receive_timeout);
        context.cache.run()?;

        Ok(context)
    }

    /// Builds a context over a caller-supplied transport without launching
    /// the decay thread. Used by tests and by callers that manage decay
    /// themselves.
    pub fn with_transport(
        transport: Box<dyn Transport + Send + Sync>,
        peer: SocketAddr,
        receive_timeout: Duration,
    ) -> Arc<ClientContext> {
        Arc::new(ClientContext {
            cache: RecordCache::new(),
            transport,
            peer,
            receive_timeout,
            statistics: ClientStatistics::new(),
        })
    }
}
