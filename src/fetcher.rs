//! Waveform retrieval with retries and error normalization.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::datacenter::DataCenterResolver;
use crate::error::{Result, SeisplotError};
use crate::fdsn::{
    Endpoint, FdsnError, Service, ServiceConnector, Stream, WaveformRequest, WaveformService,
    DEFAULT_USER_AGENT,
};
use crate::logging::log_stream_stats;
use crate::retry::RetryPolicy;

/// Identifies this product to remote data centers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    pub product: String,
    pub version: String,
    pub url: String,
}

impl UserAgent {
    pub fn new(
        product: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            version: version.into(),
            url: url.into(),
        }
    }

    /// `<product>/<version> (+<url>) <library agent>[ on behalf of <subject>]`
    pub fn header_value(&self, on_behalf_of: Option<&str>) -> String {
        let agent = format!(
            "{}/{} (+{}) {}",
            self.product, self.version, self.url, *DEFAULT_USER_AGENT
        );
        match on_behalf_of {
            Some(subject) if !subject.is_empty() => format!("{} on behalf of {}", agent, subject),
            _ => agent,
        }
    }
}

/// True when a service error looks like an authentication failure.
///
/// FDSN services report these only as free text.
pub fn is_authentication_error(error: &FdsnError) -> bool {
    error.to_string().to_lowercase().contains("authentication")
}

/// Normalize a service error into the domain taxonomy
fn translate(error: FdsnError) -> SeisplotError {
    match error {
        FdsnError::NoData => SeisplotError::NoDataFound,
        e if is_authentication_error(&e) => {
            debug!(error = %e, "Treating authentication failure as no data");
            SeisplotError::NoDataFound
        }
        e => SeisplotError::Fdsn(e),
    }
}

/// Resolves data centers, connects clients and fetches waveforms
#[derive(Clone)]
pub struct WaveformFetcher {
    resolver: DataCenterResolver,
    connector: Arc<dyn ServiceConnector>,
    retry: RetryPolicy,
    user_agent: UserAgent,
}

impl WaveformFetcher {
    pub fn new(
        resolver: DataCenterResolver,
        connector: Arc<dyn ServiceConnector>,
        retry: RetryPolicy,
        user_agent: UserAgent,
    ) -> Self {
        Self {
            resolver,
            connector,
            retry,
            user_agent,
        }
    }

    pub fn resolver(&self) -> &DataCenterResolver {
        &self.resolver
    }

    /// Connect a client for `endpoint`, retrying service errors
    pub async fn connect(
        &self,
        endpoint: &Endpoint,
        on_behalf_of: Option<&str>,
    ) -> Result<Box<dyn WaveformService>> {
        let agent = self.user_agent.header_value(on_behalf_of);
        debug!(user_agent = %agent, endpoint = %endpoint.label, "Connecting");

        let connector = self.connector.as_ref();
        let agent = agent.as_str();
        self.retry
            .run(
                "connect",
                move || async move {
                    connector
                        .connect(endpoint, agent)
                        .await
                        .map_err(SeisplotError::from)
                },
                SeisplotError::is_retryable,
            )
            .await
    }

    /// Fetch waveforms from a connected client.
    ///
    /// Fails with `NoDataService` if the client has no dataselect service.
    /// No-data answers and authentication failures become `NoDataFound`;
    /// other service errors are retried and then returned unchanged.
    pub async fn get_waveform_data(
        &self,
        client: &dyn WaveformService,
        request: &WaveformRequest,
    ) -> Result<Stream> {
        if !client.has_service(Service::Dataselect) {
            return Err(SeisplotError::NoDataService {
                base_url: client.base_url().to_string(),
            });
        }

        let stream = self
            .retry
            .run(
                "get_waveforms",
                move || async move { client.get_waveforms(request).await.map_err(translate) },
                SeisplotError::is_retryable,
            )
            .await?;

        if stream.is_empty() {
            return Err(SeisplotError::NoDataFound);
        }
        Ok(stream)
    }

    /// Resolve, connect and fetch.
    ///
    /// Unknown data centers and clients that cannot be connected are reported
    /// as `NoDataFound`.
    pub async fn fetch(
        &self,
        data_center: &str,
        request: &WaveformRequest,
        on_behalf_of: Option<&str>,
    ) -> Result<Stream> {
        let endpoint = match self.resolver.resolve_checked(data_center) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(error = %e, data_center = data_center, "Cannot resolve data center");
                return Err(SeisplotError::NoDataFound);
            }
        };

        let client = match self.connect(&endpoint, on_behalf_of).await {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    error = %e,
                    data_center = data_center,
                    base_url = %endpoint.base_url,
                    "Cannot connect to data center"
                );
                return Err(SeisplotError::NoDataFound);
            }
        };

        let stream = self.get_waveform_data(client.as_ref(), request).await?;
        log_stream_stats(data_center, &request.id(), &stream);
        Ok(stream)
    }
}
