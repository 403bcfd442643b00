#![forbid(unsafe_code)]

//! Segment transport for the lyre pipeline.
//!
//! [`DataSource`] is the only thing the playback session needs from the
//! network. [`HttpSource`] implements it over `reqwest`; [`RetrySource`] and
//! [`TimeoutSource`] are decorators stacked with [`DataSourceExt`].

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use crate::{
    client::HttpSource,
    error::{NetError, NetResult},
    retry::{DefaultRetryPolicy, RetryPolicyTrait, RetrySource},
    timeout::TimeoutSource,
    traits::{DataSource, DataSourceExt},
    types::{NetOptions, RetryPolicy},
};
