//! Result streaming from the storage collaborator
//!
//! Rows are produced on a blocking worker and handed to the async consumer
//! through a capacity-1 channel, so the producer waits for the consumer
//! instead of buffering or dropping rows.
//!
//! ```text
//! spawn_blocking: QueryStore::query ── visit(row) ──┐
//!                   (cancellation check per row)     │ blocking_send
//!                                                    ▼
//!                                        mpsc::channel(1) → RowStream<T>
//! ```
//!
//! Item rules:
//! - decode failure: one `Err(StreamError::Decode)`, the stream continues
//! - cancellation/deadline: one terminal `Err(StreamError::Cancelled)`
//! - execution or cursor failure: one terminal `Err(StreamError::Storage)`
//!
//! The cursor is owned by `QueryStore::query` and released when it returns.

use crate::rows::{DecodeError, FromRow};
use crate::storage::{QueryParams, QueryStore, StorageError};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

pub type RowStream<T> = ReceiverStream<Result<T, StreamError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller went away (client disconnect, handler dropped)
    Caller,
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Caller => write!(f, "cancelled by caller"),
            CancelReason::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    Decode(DecodeError),
    Cancelled(CancelReason),
    Storage(StorageError),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Decode(e) => write!(f, "unable to decode row: {}", e),
            StreamError::Cancelled(reason) => write!(f, "stream stopped: {}", reason),
            StreamError::Storage(e) => write!(f, "unable to execute query: {}", e),
        }
    }
}

impl std::error::Error for StreamError {}

/// Cancellation signal and deadline for one RPC invocation
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    /// Fresh context expiring after `timeout`, plus a guard that cancels it
    /// when dropped. Handlers hold the guard so that dropping the handler
    /// future (client disconnect, server timeout) stops the producer.
    ///
    /// A timeout too large to represent as an `Instant` means no deadline.
    pub fn with_timeout(timeout: Duration) -> (Self, DropGuard) {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        (Self::new(token, Instant::now().checked_add(timeout)), guard)
    }

    /// Why production must stop, if it must
    pub fn cancellation(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Caller);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::Deadline),
            _ => None,
        }
    }
}

/// Execute `query` and stream decoded rows
///
/// Must be called inside a tokio runtime. The returned stream always ends,
/// either on exhaustion or right after a terminal error item.
pub fn stream<T>(
    store: Arc<dyn QueryStore>,
    query: String,
    params: QueryParams,
    ctx: RequestContext,
) -> RowStream<T>
where
    T: FromRow + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    tokio::task::spawn_blocking(move || {
        produce::<T>(store.as_ref(), &query, &params, &ctx, &tx);
    });

    ReceiverStream::new(rx)
}

fn produce<T: FromRow>(
    store: &dyn QueryStore,
    query: &str,
    params: &QueryParams,
    ctx: &RequestContext,
    tx: &mpsc::Sender<Result<T, StreamError>>,
) {
    let mut produced = 0usize;
    let mut stopped = false;

    let result = store.query(query, params, &mut |row| {
        if let Some(reason) = ctx.cancellation() {
            log::debug!("⏹️  Row production stopped after {} rows: {}", produced, reason);
            let _ = tx.blocking_send(Err(StreamError::Cancelled(reason)));
            stopped = true;
            return ControlFlow::Break(());
        }

        let item = T::from_row(&row).map_err(StreamError::Decode);
        if tx.blocking_send(item).is_err() {
            log::debug!("Consumer went away after {} rows, releasing cursor", produced);
            stopped = true;
            return ControlFlow::Break(());
        }

        produced += 1;
        ControlFlow::Continue(())
    });

    match result {
        Ok(()) => {
            if !stopped {
                log::debug!("📤 Stream exhausted: {} rows from {}", produced, store.backend_type());
            }
        }
        Err(e) => {
            log::error!("❌ Storage failure after {} rows: {}", produced, e);
            let _ = tx.blocking_send(Err(StreamError::Storage(e)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::MarketRow;
    use crate::storage::{Row, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    /// In-memory store tracking cursor lifetime
    struct FakeStore {
        rows: Vec<Row>,
        fail_after: Option<usize>,
        fetched: AtomicUsize,
        cursor_open: Arc<AtomicBool>,
        cursor_released: Arc<AtomicBool>,
    }

    struct CursorGuard {
        open: Arc<AtomicBool>,
        released: Arc<AtomicBool>,
    }

    impl Drop for CursorGuard {
        fn drop(&mut self) {
            self.open.store(false, Ordering::SeqCst);
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl FakeStore {
        fn with_markets(count: usize) -> Self {
            let rows = (0..count)
                .map(|i| Row::new(vec![Value::Text(format!("MARKET{}", i))]))
                .collect();
            Self::with_rows(rows)
        }

        fn with_rows(rows: Vec<Row>) -> Self {
            Self {
                rows,
                fail_after: None,
                fetched: AtomicUsize::new(0),
                cursor_open: Arc::new(AtomicBool::new(false)),
                cursor_released: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl QueryStore for FakeStore {
        fn query(
            &self,
            _query: &str,
            _params: &QueryParams,
            visit: &mut dyn FnMut(Row) -> ControlFlow<()>,
        ) -> Result<(), StorageError> {
            self.cursor_open.store(true, Ordering::SeqCst);
            let _cursor = CursorGuard {
                open: self.cursor_open.clone(),
                released: self.cursor_released.clone(),
            };

            for (idx, row) in self.rows.iter().enumerate() {
                if self.fail_after == Some(idx) {
                    return Err(StorageError::Cursor("connection reset".to_string()));
                }
                self.fetched.fetch_add(1, Ordering::SeqCst);
                if visit(row.clone()).is_break() {
                    break;
                }
            }
            Ok(())
        }

        fn backend_type(&self) -> &'static str {
            "fake"
        }
    }

    fn no_deadline() -> RequestContext {
        RequestContext::new(CancellationToken::new(), None)
    }

    #[tokio::test]
    async fn test_stream_all_rows_in_order() {
        let store = Arc::new(FakeStore::with_markets(5));
        let released = store.cursor_released.clone();

        let items: Vec<_> = stream::<MarketRow>(store, "q".to_string(), QueryParams::new(), no_deadline())
            .collect()
            .await;

        let names: Vec<String> = items.into_iter().map(|i| i.unwrap().name).collect();
        assert_eq!(names, vec!["MARKET0", "MARKET1", "MARKET2", "MARKET3", "MARKET4"]);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_decode_error_does_not_stop_stream() {
        let store = Arc::new(FakeStore::with_rows(vec![
            Row::new(vec![Value::Text("BTCUSD".to_string())]),
            Row::new(vec![Value::Integer(7)]),
            Row::new(vec![Value::Text("ETHUSD".to_string())]),
        ]));

        let items: Vec<_> = stream::<MarketRow>(store, "q".to_string(), QueryParams::new(), no_deadline())
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(StreamError::Decode(_))));
        assert_eq!(items[2].as_ref().unwrap().name, "ETHUSD");
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_yields_single_terminal_item() {
        let store = Arc::new(FakeStore::with_markets(100));
        let released = store.cursor_released.clone();
        let token = CancellationToken::new();
        let ctx = RequestContext::new(token.clone(), None);

        let mut rows = stream::<MarketRow>(store.clone(), "q".to_string(), QueryParams::new(), ctx);

        for _ in 0..3 {
            assert!(rows.next().await.unwrap().is_ok());
        }
        token.cancel();

        // Drain to the end: at most the rows already in flight, then one
        // cancellation item, then nothing.
        let mut rest = Vec::new();
        while let Some(item) = rows.next().await {
            rest.push(item);
        }

        let cancelled: Vec<_> = rest
            .iter()
            .filter(|i| matches!(i, Err(StreamError::Cancelled(CancelReason::Caller))))
            .collect();
        assert_eq!(cancelled.len(), 1);
        assert!(matches!(rest.last(), Some(Err(StreamError::Cancelled(_)))));
        assert!(rest.len() <= 3, "got {} items after cancel", rest.len());
        assert!(store.fetched.load(Ordering::SeqCst) < 100);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_slow_consumer_blocks_producer() {
        let store = Arc::new(FakeStore::with_markets(100));

        let mut rows = stream::<MarketRow>(store.clone(), "q".to_string(), QueryParams::new(), no_deadline());
        assert_eq!(rows.next().await.unwrap().unwrap().name, "MARKET0");

        tokio::time::sleep(Duration::from_millis(50)).await;

        // One row taken, one in the channel, one waiting in blocking_send
        let fetched = store.fetched.load(Ordering::SeqCst);
        assert!(fetched <= 3, "producer ran ahead: {} rows fetched", fetched);

        let mut names = vec!["MARKET0".to_string()];
        while let Some(item) = rows.next().await {
            names.push(item.unwrap().name);
        }
        let expected: Vec<String> = (0..100).map(|i| format!("MARKET{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(store.fetched.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_expired_deadline_cancels_before_first_row() {
        let store = Arc::new(FakeStore::with_markets(10));
        let ctx = RequestContext::new(
            CancellationToken::new(),
            Some(Instant::now() - Duration::from_millis(1)),
        );

        let items: Vec<_> = stream::<MarketRow>(store.clone(), "q".to_string(), QueryParams::new(), ctx)
            .collect()
            .await;

        assert_eq!(items, vec![Err(StreamError::Cancelled(CancelReason::Deadline))]);
        assert!(store.cursor_released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_storage_failure_is_terminal() {
        let mut fake = FakeStore::with_markets(10);
        fake.fail_after = Some(2);
        let store = Arc::new(fake);

        let items: Vec<_> = stream::<MarketRow>(store.clone(), "q".to_string(), QueryParams::new(), no_deadline())
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok() && items[1].is_ok());
        assert!(matches!(&items[2], Err(StreamError::Storage(_))));
        assert!(store.cursor_released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropped_consumer_releases_cursor() {
        let store = Arc::new(FakeStore::with_markets(1000));
        let released = store.cursor_released.clone();

        let mut rows = stream::<MarketRow>(store.clone(), "q".to_string(), QueryParams::new(), no_deadline());
        assert!(rows.next().await.is_some());
        drop(rows);

        for _ in 0..200 {
            if released.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(released.load(Ordering::SeqCst));
        assert!(store.fetched.load(Ordering::SeqCst) < 1000);
    }

    #[test]
    fn test_drop_guard_cancels_context() {
        let (ctx, guard) = RequestContext::with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.cancellation(), None);
        drop(guard);
        assert_eq!(ctx.cancellation(), Some(CancelReason::Caller));
    }

    #[test]
    fn test_huge_timeout_means_no_deadline() {
        let (ctx, _guard) = RequestContext::with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline, None);
        assert_eq!(ctx.cancellation(), None);

        let (ctx, _guard) = RequestContext::with_timeout(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ctx.cancellation(), None);
    }
}
