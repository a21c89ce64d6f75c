//! FDSN web service access.
//!
//! The rest of the crate talks to data centers through the
//! [`ServiceConnector`] and [`WaveformService`] traits; [`FdsnConnector`] is
//! the HTTP implementation.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod mseed;
pub mod stream;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::fmt;
use thiserror::Error;

use crate::time_range::TimeRange;

pub use client::{FdsnClient, FdsnConnector};
pub use mseed::MseedError;
pub use stream::{Stream, Trace, TraceStats};

/// Agent string identifying this client library, appended to the product agent
pub static DEFAULT_USER_AGENT: Lazy<String> = Lazy::new(|| {
    format!(
        "seisplot-fdsn/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
});

/// Errors raised by an FDSN data center or while talking to it.
///
/// This is the family the fetcher retries.
#[derive(Error, Debug)]
pub enum FdsnError {
    /// The service answered but has no data for the request
    #[error("No data available for request")]
    NoData,

    /// None of the FDSN services answered at this base URL
    #[error("No FDSN services could be discovered at '{base_url}'")]
    NoServices { base_url: String },

    /// Non-success HTTP status
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    /// Connection, timeout or body transfer failures
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not valid miniSEED
    #[error("Invalid waveform data: {0}")]
    Decode(#[from] MseedError),
}

/// FDSN services a data center may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    Dataselect,
    Station,
    Event,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Dataselect, Service::Station, Service::Event];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Dataselect => "dataselect",
            Service::Station => "station",
            Service::Event => "event",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A data center the resolver knows how to reach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Client label, e.g. `IRIS`
    pub label: String,
    /// Base URL without the `/fdsnws/...` suffix
    pub base_url: String,
}

/// One channel over one time window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformRequest {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub time_range: TimeRange,
}

impl WaveformRequest {
    pub fn start(&self) -> DateTime<Utc> {
        self.time_range.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.time_range.end
    }

    /// `NET.STA.LOC.CHA`
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// A connected data-center client
#[async_trait]
pub trait WaveformService: Send + Sync {
    /// Base URL of the data center
    fn base_url(&self) -> &str;

    /// Whether the data center advertises `service`
    fn has_service(&self, service: Service) -> bool;

    /// Fetch waveforms for one channel and time window
    async fn get_waveforms(&self, request: &WaveformRequest) -> Result<Stream, FdsnError>;
}

/// Creates connected clients for endpoints
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        user_agent: &str,
    ) -> Result<Box<dyn WaveformService>, FdsnError>;
}
