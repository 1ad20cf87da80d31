//! Query construction for the two storage-backed query shapes
//!
//! The builder only renders text; it never executes anything. User-supplied
//! filter values are never rendered into the query; they travel separately as
//! named parameters (see [`query_params`]).

pub mod template;

pub use template::{Template, TemplateError};

use crate::filter::Filter;
use crate::storage::{ParamValue, QueryParams};
use std::fmt;

pub const DEFAULT_TABLE: &str = "ohlcv_hourly";

static MARKETS_TEMPLATE: Template =
    Template::new("markets.sql", include_str!("../../sql/markets.sql"));
static PRICE_DIFF_TEMPLATE: Template =
    Template::new("price_diff.sql", include_str!("../../sql/price_diff.sql"));

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBuildError {
    Template(TemplateError),
    InvalidTable(String),
}

impl From<TemplateError> for QueryBuildError {
    fn from(err: TemplateError) -> Self {
        QueryBuildError::Template(err)
    }
}

impl fmt::Display for QueryBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryBuildError::Template(e) => write!(f, "unable to render template: {}", e),
            QueryBuildError::InvalidTable(t) => write!(f, "invalid source table name: '{}'", t),
        }
    }
}

impl std::error::Error for QueryBuildError {}

/// `[A-Za-z_][A-Za-z0-9_]*`, optionally schema-qualified with one dot
fn is_identifier(name: &str) -> bool {
    let mut parts = name.split('.');
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    };

    match (parts.next(), parts.next(), parts.next()) {
        (Some(table), None, None) => valid_part(table),
        (Some(schema), Some(table), None) => valid_part(schema) && valid_part(table),
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    markets: Template,
    price_diff: Template,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_templates(table, MARKETS_TEMPLATE, PRICE_DIFF_TEMPLATE)
    }

    pub fn with_templates(table: impl Into<String>, markets: Template, price_diff: Template) -> Self {
        Self {
            table: table.into(),
            markets,
            price_diff,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn vars(&self, filter: &Filter) -> Result<Vec<(&'static str, String)>, QueryBuildError> {
        if !is_identifier(&self.table) {
            return Err(QueryBuildError::InvalidTable(self.table.clone()));
        }

        Ok(vec![
            ("table", self.table.clone()),
            ("granularity", filter.granularity.as_str().to_string()),
        ])
    }

    pub fn build_markets_query(&self, filter: &Filter) -> Result<String, QueryBuildError> {
        Ok(self.markets.render(&self.vars(filter)?)?)
    }

    pub fn build_diff_query(&self, filter: &Filter) -> Result<String, QueryBuildError> {
        Ok(self.price_diff.render(&self.vars(filter)?)?)
    }
}

/// Named parameters bound from the filter
///
/// Times are epoch seconds, window size is in hours.
pub fn query_params(filter: &Filter) -> QueryParams {
    QueryParams::new()
        .with("markets", ParamValue::TextList(filter.markets.clone()))
        .with("startTime", ParamValue::Integer(filter.start_time.timestamp()))
        .with("endTime", ParamValue::Integer(filter.end_time.timestamp()))
        .with("exchanges", ParamValue::TextList(filter.exchanges.clone()))
        .with("windowSize", ParamValue::Integer(filter.window_size))
}
