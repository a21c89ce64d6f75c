//! HTTP client for FDSN web services.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    mseed, Endpoint, FdsnError, Service, ServiceConnector, Stream, WaveformRequest,
    WaveformService,
};

/// Default HTTP timeout for FDSN requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest server detail kept in error messages
const MAX_DETAIL_LEN: usize = 300;

/// A client bound to one data center, with its services discovered.
#[derive(Debug, Clone)]
pub struct FdsnClient {
    http: reqwest::Client,
    base_url: String,
    services: BTreeSet<Service>,
}

impl FdsnClient {
    /// Connect to a data center and discover which services it offers.
    ///
    /// Every service's `version` endpoint is queried concurrently. A query that
    /// fails marks its service absent. Fails when no service answers, with the
    /// first error if there was one and `NoServices` otherwise.
    pub async fn connect(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, FdsnError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let checks = Service::ALL
            .iter()
            .map(|service| check_service(&http, &base_url, *service));
        let results = join_all(checks).await;

        let mut services = BTreeSet::new();
        let mut first_error = None;
        for (service, available) in Service::ALL.iter().zip(results) {
            match available {
                Ok(true) => {
                    services.insert(*service);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        base_url = %base_url,
                        service = ?service,
                        error = %e,
                        "Service check failed, treating service as absent"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if services.is_empty() {
            return Err(first_error.unwrap_or(FdsnError::NoServices { base_url }));
        }

        debug!(
            base_url = %base_url,
            services = ?services,
            "Discovered FDSN services"
        );

        Ok(Self {
            http,
            base_url,
            services,
        })
    }

    pub fn services(&self) -> &BTreeSet<Service> {
        &self.services
    }

    fn query_url(&self, service: Service) -> String {
        service_url(&self.base_url, service, "query")
    }

    /// Fetch waveforms from the dataselect service and decode them
    pub async fn fetch_waveforms(&self, request: &WaveformRequest) -> Result<Stream, FdsnError> {
        let location = if request.location.is_empty() {
            "--"
        } else {
            request.location.as_str()
        };
        let params = [
            ("network", request.network.clone()),
            ("station", request.station.clone()),
            ("location", location.to_string()),
            ("channel", request.channel.clone()),
            ("starttime", format_time(&request.start())),
            ("endtime", format_time(&request.end())),
        ];

        let url = self.query_url(Service::Dataselect);
        debug!(url = %url, request = %request.id(), "Requesting waveforms");

        let response = self.http.get(&url).query(&params).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(FdsnError::NoData);
        }

        let stream = mseed::decode(&body)?;
        if stream.is_empty() {
            return Err(FdsnError::NoData);
        }
        Ok(stream)
    }
}

#[async_trait]
impl WaveformService for FdsnClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn has_service(&self, service: Service) -> bool {
        self.services.contains(&service)
    }

    async fn get_waveforms(&self, request: &WaveformRequest) -> Result<Stream, FdsnError> {
        self.fetch_waveforms(request).await
    }
}

/// Connects [`FdsnClient`]s over HTTP
#[derive(Debug, Clone)]
pub struct FdsnConnector {
    timeout: Duration,
}

impl FdsnConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for FdsnConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ServiceConnector for FdsnConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        user_agent: &str,
    ) -> Result<Box<dyn WaveformService>, FdsnError> {
        let client = FdsnClient::connect(&endpoint.base_url, user_agent, self.timeout).await?;
        Ok(Box::new(client))
    }
}

fn service_url(base_url: &str, service: Service, method: &str) -> String {
    format!("{}/fdsnws/{}/1/{}", base_url, service, method)
}

fn format_time(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Ask a service for its `version`.
///
/// Client errors mean the service is absent; server errors are returned.
async fn check_service(
    http: &reqwest::Client,
    base_url: &str,
    service: Service,
) -> Result<bool, FdsnError> {
    let url = service_url(base_url, service, "version");
    let response = http.get(&url).send().await?;
    let status = response.status();

    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    Ok(status.is_success() && status != StatusCode::NO_CONTENT)
}

/// Map a non-200 status to an error, keeping the server's own explanation.
pub fn status_error(status: StatusCode, body: &str) -> FdsnError {
    let summary = match status.as_u16() {
        204 | 404 => return FdsnError::NoData,
        400 => "Bad request.".to_string(),
        401 => "Unauthorized, authentication required.".to_string(),
        403 => "Authentication failed.".to_string(),
        413 => "Request would result in too much data.".to_string(),
        414 => "Request URI too large.".to_string(),
        429 => "Too many requests.".to_string(),
        500 => "Service responds: Internal server error.".to_string(),
        503 => "Service temporarily unavailable.".to_string(),
        other => format!("Unknown HTTP code: {}.", other),
    };

    let detail: String = body.trim().chars().take(MAX_DETAIL_LEN).collect();
    let message = if detail.is_empty() {
        summary
    } else {
        format!("{} Detailed response of server: {}", summary, detail)
    };

    FdsnError::Http {
        status: status.as_u16(),
        message,
    }
}
