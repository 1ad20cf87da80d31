//! gRPC handlers for the dashboards service
//!
//! Each call: normalize → build query → stream → gate → response.
//! Everything a call creates (filter, query text, accumulator, cancellation
//! token) lives only for that call.

pub mod error;
pub mod exchanges;

pub use error::ServiceError;
pub use exchanges::{exchange_names, EXCHANGES};

use crate::filter::{self, Filter};
use crate::gate::ResponseAccumulator;
use crate::proto::dashboards_server::Dashboards;
use crate::proto::{
    BasicRequest, Empty, ExchangesResponse, MarketsResponse, OhlcvDiffResponse, Point,
};
use crate::query::{self, QueryBuildError, QueryBuilder};
use crate::rows::{DiffPoint, FromRow, MarketRow};
use crate::storage::QueryStore;
use crate::streaming::{self, RequestContext};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};

/// Substitute for literal zero in diff points; charts treat 0 as "missing"
pub const ZERO_SHIELD: f64 = 0.00000000000000001;

pub fn shield_zero(value: f64) -> f64 {
    if value == 0.0 {
        return ZERO_SHIELD;
    }
    value
}

impl From<DiffPoint> for Point {
    fn from(diff: DiffPoint) -> Self {
        Point {
            timestamp: diff.timestamp.timestamp_millis(),
            market: diff.market,
            avg: shield_zero(diff.avg),
            volume_token: shield_zero(diff.volume_token),
        }
    }
}

pub fn normalize_request(request: BasicRequest) -> Result<Filter, filter::FilterError> {
    filter::normalize(
        request.exchanges,
        request.markets,
        request.start,
        request.end,
        request.window_size,
        request.window_unit,
    )
}

pub struct DashboardsService {
    store: Arc<dyn QueryStore>,
    builder: QueryBuilder,
    max_data_corrupt: f64,
    request_timeout: Duration,
}

impl DashboardsService {
    pub fn new(
        store: Arc<dyn QueryStore>,
        builder: QueryBuilder,
        max_data_corrupt: f64,
        request_timeout: Duration,
    ) -> Self {
        log::info!(
            "📋 Registering dashboards service (backend={}, table={}, max_data_corrupt={}%)",
            store.backend_type(),
            builder.table(),
            max_data_corrupt
        );

        Self {
            store,
            builder,
            max_data_corrupt,
            request_timeout,
        }
    }

    /// Build, stream and gate one query shape
    async fn run_query<T>(
        &self,
        filter: &Filter,
        build: fn(&QueryBuilder, &Filter) -> Result<String, QueryBuildError>,
    ) -> Result<Vec<T>, ServiceError>
    where
        T: FromRow + Send + 'static,
    {
        let query = build(&self.builder, filter)?;

        // Dropping this future (client gone, server timeout) drops the guard
        // and cancels the producer.
        let (ctx, _cancel_on_drop) = RequestContext::with_timeout(self.request_timeout);

        log::debug!(
            "Executing query: filter={}",
            serde_json::to_string(filter).unwrap_or_default()
        );
        let mut rows =
            streaming::stream::<T>(self.store.clone(), query, query::query_params(filter), ctx);

        let mut acc = ResponseAccumulator::new();
        while let Some(item) = rows.next().await {
            acc.push(item);
        }

        if acc.failed() > 0 {
            log::warn!(
                "⚠️  {} corrupt rows out of {}",
                acc.failed(),
                acc.failed() + acc.succeeded()
            );
        }

        Ok(acc.finish(self.max_data_corrupt)?)
    }

    async fn markets(&self, request: BasicRequest) -> Result<Vec<MarketRow>, ServiceError> {
        let filter = normalize_request(request)?;
        self.run_query(&filter, QueryBuilder::build_markets_query)
            .await
    }

    async fn ohlcv_diff(&self, request: BasicRequest) -> Result<Vec<DiffPoint>, ServiceError> {
        let filter = normalize_request(request)?;
        log::debug!(
            "Price diff granularity={} window={}h",
            filter.granularity,
            filter.window_size
        );
        self.run_query(&filter, QueryBuilder::build_diff_query)
            .await
    }
}

#[async_trait]
impl Dashboards for DashboardsService {
    async fn status(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        log::debug!("Received status request");
        Ok(Response::new(Empty {}))
    }

    async fn get_markets(
        &self,
        request: Request<BasicRequest>,
    ) -> Result<Response<MarketsResponse>, Status> {
        const OP: &str = "GetMarkets";
        log::debug!("Received markets request");

        let result = self.markets(request.into_inner()).await;

        match result {
            Ok(markets) => Ok(Response::new(MarketsResponse {
                markets: markets.into_iter().map(|m| m.name).collect(),
            })),
            Err(e) => {
                e.log(OP);
                Err(e.into())
            }
        }
    }

    async fn get_exchanges(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<ExchangesResponse>, Status> {
        log::debug!("Received exchanges request");
        Ok(Response::new(ExchangesResponse {
            exchanges: exchange_names(),
        }))
    }

    async fn get_ohlcv_diff(
        &self,
        request: Request<BasicRequest>,
    ) -> Result<Response<OhlcvDiffResponse>, Status> {
        const OP: &str = "GetOhlcvDiff";
        log::debug!("Received price diff request");

        let result = self.ohlcv_diff(request.into_inner()).await;

        match result {
            Ok(diffs) => Ok(Response::new(OhlcvDiffResponse {
                points: diffs.into_iter().map(Point::from).collect(),
            })),
            Err(e) => {
                e.log(OP);
                Err(e.into())
            }
        }
    }
}
