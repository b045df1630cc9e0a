use crate::error::{Error, Result};
use crate::opts::ConnectionOpts;
use glacier_context::QueryContextCache;
use glacier_protocol::{QueryContextDTO, QueryResponse, QueryResponseData};
use glacier_result::{FetchContext, ResultSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Client side state of a session.
///
/// A connection can be shared between threads. Query context is merged from
/// every response and sent back with every following query.
#[derive(Debug)]
pub struct Connection {
    ctx: Arc<FetchContext>,
    qcc: QueryContextCache,
    closed: AtomicBool,
}

impl Connection {
    #[inline]
    pub fn new(opts: ConnectionOpts) -> Self {
        Connection {
            ctx: Arc::new(opts.fetch_context()),
            qcc: QueryContextCache::new(opts.get_query_context_cache_size()),
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn fetch_context(&self) -> &Arc<FetchContext> {
        &self.ctx
    }

    #[inline]
    pub fn query_context_cache(&self) -> &QueryContextCache {
        &self.qcc
    }

    /// Query context attached to next query request as `queryContextDTO`.
    #[inline]
    pub fn query_context_dto(&self) -> QueryContextDTO {
        self.qcc.serialize_dto()
    }

    /// Merge query context of the response, then build its result set.
    pub fn handle_response(&self, data: &QueryResponseData) -> Result<ResultSet> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.qcc.deserialize(data.query_context.as_ref());
        let rs = ResultSet::from_response(data, Arc::clone(&self.ctx))?;
        log::debug!(
            "Query {} returned {} rows in {} batches",
            data.query_id,
            rs.total_row_index(),
            rs.batches().len()
        );
        Ok(rs)
    }

    /// Parse raw response body and handle it.
    #[inline]
    pub fn handle_response_body(&self, body: &[u8]) -> Result<ResultSet> {
        let data = QueryResponse::from_slice(body)?.into_data()?;
        self.handle_response(&data)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drop all session state. Result sets already built stay usable.
    #[inline]
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.qcc.clear();
    }
}
