//! cache-first resolution composing the record cache and the query client

use std::sync::atomic::Ordering;
use std::sync::Arc;

use derive_more::{Display, Error, From};

use crate::dns::cache::Record;
use crate::dns::client::{run_query, TransactionOutcome};
use crate::dns::context::ClientContext;
use crate::dns::protocol::Answer;

#[derive(Debug, Display, From, Error)]
pub enum ResolveError {
    Client(crate::dns::client::ClientError),
    Cache(crate::dns::cache::CacheError),
    Io(std::io::Error),
}

type Result<T> = std::result::Result<T, ResolveError>;

/// How one resolution attempt ended. Every variant leaves the cache
/// consistent; only `Answered` mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Served from the cache without contacting the peer.
    CacheHit(Record),
    /// A fresh answer, installed as a dynamic record.
    Answered(Answer),
    /// The peer answered that no such record exists. Nothing is cached.
    NegativeAnswer,
    /// No reply within the timeout.
    NoResponse,
    /// A reply arrived but was undecodable or not ours.
    Rejected,
}

/// Consults the cache first and falls back to a single query transaction
/// against the configured resolver peer on a miss.
pub struct CacheFirstResolver {
    context: Arc<ClientContext>,
}

impl CacheFirstResolver {
    pub fn new(context: Arc<ClientContext>) -> CacheFirstResolver {
        CacheFirstResolver { context }
    }

    pub fn get_context(&self) -> Arc<ClientContext> {
        self.context.clone()
    }

    /// Resolves `qname`/`qtype`: a valid cache hit is returned as-is, with no
    /// refresh of its TTL. On a miss exactly one transaction runs; a positive
    /// answer is installed as a dynamic record under the TTL it carried.
    ///
    /// Only transport faults escape as errors; protocol-level failures fold
    /// into the outcome so a session can keep going.
    pub fn resolve(&self, qname: &str, qtype: &str) -> Result<ResolveOutcome> {
        if let Some(record) = self.context.cache.lookup(qname, qtype) {
            log::info!("cache hit for {} {}", qname, qtype);
            self.context.statistics.cache_hits.fetch_add(1, Ordering::Release);
            return Ok(ResolveOutcome::CacheHit(record));
        }

        log::info!("cache miss for {} {}, querying peer", qname, qtype);
        self.context.statistics.queries_sent.fetch_add(1, Ordering::Release);

        let outcome = run_query(
            self.context.transport.as_ref(),
            self.context.peer,
            qname,
            qtype,
            self.context.receive_timeout,
        )?;

        match outcome {
            TransactionOutcome::Answered(answer) => {
                if answer.is_not_found() {
                    return Ok(ResolveOutcome::NegativeAnswer);
                }

                self.context.cache.insert(
                    &answer.name,
                    &answer.qtype,
                    &answer.result,
                    Some(answer.ttl),
                    false,
                )?;

                Ok(ResolveOutcome::Answered(answer))
            }
            TransactionOutcome::TimedOut => {
                self.context
                    .statistics
                    .failed_transactions
                    .fetch_add(1, Ordering::Release);

                Ok(ResolveOutcome::NoResponse)
            }
            TransactionOutcome::Rejected => {
                self.context
                    .statistics
                    .failed_transactions
                    .fetch_add(1, Ordering::Release);

                Ok(ResolveOutcome::Rejected)
            }
        }
    }
}
