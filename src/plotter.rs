//! Query orchestration: parameters in, PNG out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::config::Config;
use crate::datacenter::DataCenterResolver;
use crate::error::{Result, SeisplotError};
use crate::fdsn::{FdsnConnector, ServiceConnector, WaveformRequest};
use crate::fetcher::{UserAgent, WaveformFetcher};
use crate::logging::log_error;
use crate::plot::{
    ArrivalMarker, PhaseColors, PlotEngine, PlotRenderer, PlotSpec, WaveformEngine,
    DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
use crate::retry::RetryPolicy;
use crate::time_range::{parse_datetime, parse_param, TimeRange};

/// Query keys with this suffix carry a phase arrival time
const ARRIVAL_SUFFIX: &str = "_arrival";

/// Parse a yes/no flag the way `strtobool` does
pub fn parse_bool(param: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        _ => Err(SeisplotError::InvalidParameter {
            param: param.to_string(),
            message: format!("Not a boolean value: {}", value),
        }),
    }
}

fn parse_dimension(param: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| SeisplotError::InvalidParameter {
            param: param.to_string(),
            message: format!("Not a valid pixel size '{}': {}", value, e),
        })
}

/// A validated plot query
#[derive(Debug, Clone, PartialEq)]
pub struct PlotQuery {
    pub data_center: String,
    pub request: WaveformRequest,
    pub on_behalf_of: Option<String>,
    pub spec: PlotSpec,
}

impl PlotQuery {
    /// Validate raw query parameters.
    ///
    /// Required parameters are checked in the order `net, sta, loc, cha,
    /// start, end`. Arrival times that do not parse are logged and left out.
    pub fn from_params(params: &HashMap<String, String>, default_data_center: &str) -> Result<Self> {
        let required = |param: &str| {
            params
                .get(param)
                .map(String::as_str)
                .ok_or_else(|| SeisplotError::MissingParameter {
                    param: param.to_string(),
                })
        };
        let net = required("net")?;
        let sta = required("sta")?;
        let loc = required("loc")?;
        let cha = required("cha")?;
        let start = required("start")?;
        let end = required("end")?;

        let time_range = TimeRange::new(parse_param("start", start)?, parse_param("end", end)?);

        let width = match params.get("width") {
            Some(value) => parse_dimension("width", value)?,
            None => DEFAULT_WIDTH,
        };
        let height = match params.get("height") {
            Some(value) => parse_dimension("height", value)?,
            None => DEFAULT_HEIGHT,
        };
        let frame = match params.get("frame") {
            Some(value) => parse_bool("frame", value)?,
            None => false,
        };

        let mut arrival_keys: Vec<&String> = params
            .keys()
            .filter(|key| key.ends_with(ARRIVAL_SUFFIX))
            .collect();
        arrival_keys.sort();
        let arrivals = arrival_keys
            .into_iter()
            .filter_map(|key| {
                let value = &params[key];
                let phase = key.split('_').next().unwrap_or_default().to_uppercase();
                match parse_datetime(value) {
                    Some(time) => Some(ArrivalMarker::new(phase, time)),
                    None => {
                        error!(key = %key, value = %value, "Couldn't parse arrival time");
                        None
                    }
                }
            })
            .collect();

        // Only an absent `dc` falls back; an empty one is looked up as given
        let data_center = params
            .get("dc")
            .map(String::as_str)
            .unwrap_or(default_data_center)
            .to_string();

        Ok(Self {
            data_center,
            request: WaveformRequest {
                network: net.to_string(),
                station: sta.to_string(),
                location: loc.to_string(),
                channel: cha.to_string(),
                time_range,
            },
            on_behalf_of: params.get("on_behalf_of").cloned(),
            spec: PlotSpec::new(width, height, frame)?.with_arrivals(arrivals),
        })
    }
}

/// Fetches waveforms for a query and renders them
#[derive(Clone)]
pub struct Plotter {
    fetcher: WaveformFetcher,
    renderer: PlotRenderer,
    default_data_center: String,
}

impl Plotter {
    pub fn new(
        fetcher: WaveformFetcher,
        renderer: PlotRenderer,
        default_data_center: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            default_data_center: default_data_center.into(),
        }
    }

    /// Build a plotter with the HTTP connector and the built-in engine
    pub fn from_config(config: &Config) -> Result<Self> {
        let connector = Arc::new(FdsnConnector::new(Duration::from_secs(
            config.fetch.timeout_secs,
        )));
        Self::with_parts(config, connector, Arc::new(WaveformEngine::new()))
    }

    /// Build a plotter from configuration with the given collaborators
    pub fn with_parts(
        config: &Config,
        connector: Arc<dyn ServiceConnector>,
        engine: Arc<dyn PlotEngine>,
    ) -> Result<Self> {
        let resolver = DataCenterResolver::new(
            config.data_centers.aliases.clone(),
            config.data_centers.endpoints.clone(),
        );
        let retry = RetryPolicy::new(
            config.fetch.max_attempts,
            Duration::from_millis(config.fetch.retry_delay_ms),
        );
        let agent = &config.fetch.user_agent;
        let user_agent = UserAgent::new(&agent.product, &agent.version, &agent.url);
        let phase_colors = PhaseColors::from_hex_table(&config.plot.phase_colors)?;

        Ok(Self::new(
            WaveformFetcher::new(resolver, connector, retry, user_agent),
            PlotRenderer::new(engine, Arc::new(phase_colors)),
            config.fetch.default_data_center.clone(),
        ))
    }

    pub fn default_data_center(&self) -> &str {
        &self.default_data_center
    }

    pub fn fetcher(&self) -> &WaveformFetcher {
        &self.fetcher
    }

    /// Generate a PNG plot from raw query parameters
    pub async fn plot_from_query(&self, params: &HashMap<String, String>) -> Result<Vec<u8>> {
        let query = PlotQuery::from_params(params, &self.default_data_center)?;

        let fetched = self
            .fetcher
            .fetch(
                &query.data_center,
                &query.request,
                query.on_behalf_of.as_deref(),
            )
            .await;

        let stream = match fetched {
            Ok(stream) => stream,
            Err(
                e @ (SeisplotError::NoDataService { .. }
                | SeisplotError::UnavailableDataCenter { .. }),
            ) => {
                warn!(error = %e, data_center = %query.data_center, "No data available");
                return Err(SeisplotError::NoDataFound);
            }
            Err(SeisplotError::NoDataFound) => return Err(SeisplotError::NoDataFound),
            Err(e) => {
                log_error(
                    &e,
                    &format!(
                        "Failed to get data from {} for {} {}",
                        query.data_center,
                        query.request.id(),
                        query.request.time_range
                    ),
                );
                return Err(e);
            }
        };

        let renderer = self.renderer.clone();
        let time_range = query.request.time_range;
        let spec = query.spec;
        tokio::task::spawn_blocking(move || renderer.render(&stream, &time_range, spec))
            .await
            .map_err(|e| SeisplotError::Server {
                message: format!("Render task failed: {}", e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdsn::mock::{MockConnector, Reply};
    use crate::fdsn::FdsnError;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base_params() -> HashMap<String, String> {
        params(&[
            ("net", "IU"),
            ("sta", "ANMO"),
            ("loc", "00"),
            ("cha", "LHZ"),
            ("start", "2004-12-26T01:00:00"),
            ("end", "2004-12-26T01:30:00"),
        ])
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.fetch.retry_delay_ms = 0;
        config
    }

    fn plotter(connector: Arc<MockConnector>) -> (Arc<WaveformEngine>, Plotter) {
        let engine = Arc::new(WaveformEngine::new());
        let plotter = Plotter::with_parts(&test_config(), connector, engine.clone()).unwrap();
        (engine, plotter)
    }

    #[test]
    fn test_parse_bool() {
        for value in ["y", "YES", "t", "True", "on", "1"] {
            assert!(parse_bool("frame", value).unwrap());
        }
        for value in ["n", "No", "f", "FALSE", "off", "0"] {
            assert!(!parse_bool("frame", value).unwrap());
        }
        assert!(matches!(
            parse_bool("frame", "maybe"),
            Err(SeisplotError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_query_defaults() {
        let query = PlotQuery::from_params(&base_params(), "IRISDMC").unwrap();
        assert_eq!(query.data_center, "IRISDMC");
        assert_eq!(query.spec.width, 500);
        assert_eq!(query.spec.height, 200);
        assert!(!query.spec.frame);
        assert!(query.spec.arrivals.is_empty());
        assert_eq!(query.request.id(), "IU.ANMO.00.LHZ");
        assert_eq!(query.on_behalf_of, None);
    }

    #[test]
    fn test_missing_parameters_in_order() {
        let mut p = base_params();
        p.remove("cha");
        p.remove("end");
        match PlotQuery::from_params(&p, "IRISDMC") {
            Err(SeisplotError::MissingParameter { param }) => assert_eq!(param, "cha"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_parameters() {
        for (key, value) in [
            ("start", "yesterday"),
            ("width", "wide"),
            ("height", "-5"),
            ("frame", "sometimes"),
        ] {
            let mut p = base_params();
            p.insert(key.to_string(), value.to_string());
            match PlotQuery::from_params(&p, "IRISDMC") {
                Err(SeisplotError::InvalidParameter { param, .. }) => assert_eq!(param, key),
                other => panic!("unexpected for {}: {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_arrivals_are_parsed() {
        let mut p = base_params();
        p.insert("p_arrival".to_string(), "2004-12-26T01:05:00".to_string());
        p.insert("pkp_1_arrival".to_string(), "2004-12-26T01:10:00".to_string());
        p.insert("s_arrival".to_string(), "not a time".to_string());
        let query = PlotQuery::from_params(&p, "IRISDMC").unwrap();

        let phases: Vec<&str> = query.spec.arrivals.iter().map(|a| a.phase.as_str()).collect();
        assert_eq!(phases, vec!["P", "PKP"]);
    }

    #[tokio::test]
    async fn test_missing_parameter_makes_no_calls() {
        let connector = Arc::new(MockConnector::new(vec![]));
        let (_, plotter) = plotter(connector.clone());
        let mut p = base_params();
        p.remove("net");

        let result = plotter.plot_from_query(&p).await;
        assert!(matches!(result, Err(SeisplotError::MissingParameter { .. })));
        assert_eq!(connector.connect_count(), 0);
        assert_eq!(connector.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_default_data_center_is_used() {
        let connector = Arc::new(MockConnector::new(vec![Reply::Data]));
        let (engine, plotter) = plotter(connector.clone());

        let png = plotter.plot_from_query(&base_params()).await.unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(connector.last_connect().unwrap().0, "IRIS");
        assert_eq!(engine.open_figures(), 0);
    }

    #[tokio::test]
    async fn test_geofon_is_resolved_to_gfz() {
        let connector = Arc::new(MockConnector::new(vec![Reply::Data]));
        let (_, plotter) = plotter(connector.clone());
        let mut p = base_params();
        p.insert("dc".to_string(), "GEOFON".to_string());

        plotter.plot_from_query(&p).await.unwrap();
        assert_eq!(connector.last_connect().unwrap().0, "GFZ");
    }

    #[tokio::test]
    async fn test_unknown_data_center_is_no_data() {
        let connector = Arc::new(MockConnector::new(vec![]));
        let (_, plotter) = plotter(connector.clone());
        let mut p = base_params();
        p.insert("dc".to_string(), "NOWHERE".to_string());

        let result = plotter.plot_from_query(&p).await;
        assert!(matches!(result, Err(SeisplotError::NoDataFound)));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_data_center_is_no_data() {
        let connector = Arc::new(MockConnector::new(vec![]));
        let (_, plotter) = plotter(connector.clone());
        let mut p = base_params();
        p.insert("dc".to_string(), String::new());

        assert_eq!(PlotQuery::from_params(&p, "IRISDMC").unwrap().data_center, "");
        let result = plotter.plot_from_query(&p).await;
        assert!(matches!(result, Err(SeisplotError::NoDataFound)));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_data_service_is_no_data() {
        let connector = Arc::new(MockConnector::without_dataselect());
        let (_, plotter) = plotter(connector);
        let result = plotter.plot_from_query(&base_params()).await;
        assert!(matches!(result, Err(SeisplotError::NoDataFound)));
    }

    #[tokio::test]
    async fn test_service_errors_propagate() {
        let failure = || {
            Reply::Fail(FdsnError::Http {
                status: 500,
                message: "Internal server error".to_string(),
            })
        };
        let connector = Arc::new(MockConnector::new(vec![failure(), failure(), failure()]));
        let (_, plotter) = plotter(connector.clone());

        let result = plotter.plot_from_query(&base_params()).await;
        assert!(matches!(result, Err(SeisplotError::Fdsn(_))));
        assert_eq!(connector.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_short_plot_has_requested_size() {
        let connector = Arc::new(MockConnector::new(vec![Reply::Data]));
        let (engine, plotter) = plotter(connector);
        let mut p = base_params();
        p.insert("width".to_string(), "300".to_string());
        p.insert("height".to_string(), "60".to_string());
        p.insert("frame".to_string(), "yes".to_string());
        p.insert("p_arrival".to_string(), "2004-12-26T01:05:00".to_string());
        p.insert("xyz_arrival".to_string(), "2004-12-26T01:06:00".to_string());

        let png = plotter.plot_from_query(&p).await.unwrap();
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!((image.width(), image.height()), (300, 60));
        assert_eq!(engine.open_figures(), 0);
    }

    #[tokio::test]
    async fn test_narrow_plots_render() {
        let sizes = [
            (100, 200, "no"),
            (120, 150, "no"),
            (139, 300, "no"),
            (100, 200, "yes"),
            (20, 40, "yes"),
        ];
        let connector = Arc::new(MockConnector::new(vec![]));
        let (engine, plotter) = plotter(connector);

        for (width, height, frame) in sizes {
            let mut p = base_params();
            p.insert("width".to_string(), width.to_string());
            p.insert("height".to_string(), height.to_string());
            p.insert("frame".to_string(), frame.to_string());

            let png = plotter.plot_from_query(&p).await.unwrap();
            let image = image::load_from_memory(&png).unwrap();
            assert_eq!((image.width(), image.height()), (width, height));
        }
        assert_eq!(engine.open_figures(), 0);
    }
}
