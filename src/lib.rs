//! Dashboards - gRPC query service over an OHLCV market-data warehouse
//!
//! # Architecture
//!
//! ```text
//! BasicRequest → filter::normalize (sentinel, hour truncation, window validation)
//!     ↓
//! query::QueryBuilder (markets / price diff templates)
//!     ↓
//! streaming::stream (blocking producer → capacity-1 channel → handler)
//!     ↓
//! gate::ResponseAccumulator (per-row failures vs. corruption ceiling)
//!     ↓
//! service::DashboardsService → MarketsResponse / OhlcvDiffResponse
//! ```


pub mod config;
pub mod filter;
pub mod gate;
pub mod logging;
pub mod query;
pub mod rows;
pub mod service;
pub mod storage;
pub mod streaming;

pub mod proto {
    tonic::include_proto!("dashboards");
}

pub use config::{ConfigError, ServerConfig};
pub use filter::{normalize, Filter, FilterError, Granularity, WindowUnit};
pub use gate::{decide, GateDecision, ResponseAccumulator};
pub use query::{QueryBuildError, QueryBuilder};
pub use rows::{DiffPoint, FromRow, MarketRow};
pub use service::DashboardsService;
pub use storage::{QueryParams, QueryStore, SqliteStore, StorageError};
pub use streaming::{stream, CancelReason, RequestContext, RowStream, StreamError};
