//! # seisplot
//!
//! Seismic waveform plots served over HTTP.
//!
//! A query names a channel (`net`, `sta`, `loc`, `cha`), a time window and
//! optionally a data center, image size, frame flag and phase arrival times.
//! seisplot resolves the data center to an FDSN endpoint, fetches the
//! waveforms (retrying transient failures), renders them and returns a PNG.
//!
//! ## Architecture
//!
//! - **Resolution**: [`datacenter`] maps catalog names onto FDSN endpoints
//! - **Retrieval**: [`fetcher`] and [`fdsn`] talk to the data center and decode miniSEED
//! - **Rendering**: [`plot`] draws the waveform figure and encodes it as PNG
//! - **Orchestration**: [`plotter`] validates queries and ties the pieces together
//! - **API Layer**: [`handlers`] exposes everything over HTTP

pub mod config;
pub mod datacenter;
pub mod error;
pub mod fdsn;
pub mod fetcher;
pub mod handlers;
pub mod logging;
pub mod plot;
pub mod plotter;
pub mod retry;
pub mod state;
pub mod time_range;

pub use config::Config;
pub use datacenter::DataCenterResolver;
pub use error::{Result, SeisplotError};
pub use fetcher::{UserAgent, WaveformFetcher};
pub use logging::{
    create_http_trace_layer, generate_request_id, init_tracing, log_error, log_operation_end,
    log_operation_start, log_request_error, log_stream_stats, log_timed_operation,
};
pub use plot::{PlotRenderer, PlotSpec};
pub use plotter::{PlotQuery, Plotter};
pub use retry::RetryPolicy;
pub use state::AppState;
pub use time_range::TimeRange;
