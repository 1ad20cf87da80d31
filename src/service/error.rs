//! Handler errors and their gRPC status mapping

use crate::filter::FilterError;
use crate::gate::AccumulateError;
use crate::query::QueryBuildError;
use crate::streaming::CancelReason;
use std::fmt;
use tonic::{Code, Status};

const INTERNAL_MESSAGE: &str = "unable to process the request";

#[derive(Debug)]
pub enum ServiceError {
    InvalidRequest(FilterError),
    Build(QueryBuildError),
    Stream(AccumulateError),
}

impl From<FilterError> for ServiceError {
    fn from(err: FilterError) -> Self {
        ServiceError::InvalidRequest(err)
    }
}

impl From<QueryBuildError> for ServiceError {
    fn from(err: QueryBuildError) -> Self {
        ServiceError::Build(err)
    }
}

impl From<AccumulateError> for ServiceError {
    fn from(err: AccumulateError) -> Self {
        ServiceError::Stream(err)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::InvalidRequest(e) => write!(f, "invalid request: {}", e),
            ServiceError::Build(e) => write!(f, "unable to build query: {}", e),
            ServiceError::Stream(e) => write!(f, "unable to stream results: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    pub fn code(&self) -> Code {
        match self {
            ServiceError::InvalidRequest(_) => Code::InvalidArgument,
            ServiceError::Build(_) => Code::Internal,
            ServiceError::Stream(AccumulateError::Cancelled(CancelReason::Caller)) => Code::Cancelled,
            ServiceError::Stream(AccumulateError::Cancelled(CancelReason::Deadline)) => {
                Code::DeadlineExceeded
            }
            ServiceError::Stream(_) => Code::Internal,
        }
    }

    /// Log at the level the error class deserves
    pub fn log(&self, operation: &str) {
        match self {
            ServiceError::InvalidRequest(e) => {
                log::debug!("Rejected request: op={} err={}", operation, e)
            }
            ServiceError::Build(e) => {
                log::error!("❌ Query build failed (deployment defect): op={} err={}", operation, e)
            }
            ServiceError::Stream(AccumulateError::Cancelled(reason)) => {
                log::info!("⏹️  Request stopped: op={} reason={}", operation, reason)
            }
            ServiceError::Stream(e) => {
                log::error!("❌ Unable to process the request: op={} err={}", operation, e)
            }
        }
    }
}

impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        match code {
            Code::InvalidArgument => Status::invalid_argument(err.to_string()),
            Code::Cancelled => Status::cancelled("request cancelled"),
            Code::DeadlineExceeded => Status::deadline_exceeded("request deadline exceeded"),
            _ => Status::internal(INTERNAL_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ServiceError::InvalidRequest(FilterError::UnknownWindowUnit(9)),
                Code::InvalidArgument,
            ),
            (
                ServiceError::Build(QueryBuildError::InvalidTable("x y".to_string())),
                Code::Internal,
            ),
            (
                ServiceError::Stream(AccumulateError::Storage(StorageError::Query("boom".to_string()))),
                Code::Internal,
            ),
            (
                ServiceError::Stream(AccumulateError::TooCorrupt {
                    succeeded: 1,
                    failed: 1,
                    corrupt_percent: 100.0,
                }),
                Code::Internal,
            ),
            (
                ServiceError::Stream(AccumulateError::Cancelled(CancelReason::Caller)),
                Code::Cancelled,
            ),
            (
                ServiceError::Stream(AccumulateError::Cancelled(CancelReason::Deadline)),
                Code::DeadlineExceeded,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let status = Status::from(ServiceError::Stream(AccumulateError::Storage(
            StorageError::Connection("/var/lib/warehouse.db: permission denied".to_string()),
        )));
        assert_eq!(status.message(), INTERNAL_MESSAGE);
    }
}
