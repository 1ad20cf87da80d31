//! Request filter normalization and window validation
//!
//! Turns the loosely-typed RPC fields (millisecond timestamps, repeated
//! string filters, a window size + unit pair) into a canonical [`Filter`].

pub mod normalizer;
pub mod window;

pub use normalizer::{
    normalize, parse_repeated_value, parse_time, Filter, FilterError, WindowUnit,
    ALL_VALUES_SENTINEL,
};
pub use window::{granularity_for, validate, Granularity, WindowError, POINTS_ON_SCREEN};
