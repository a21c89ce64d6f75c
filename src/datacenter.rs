//! Data-center alias resolution.
//!
//! Federated catalogs and the FDSN client name some data centers
//! differently (`GEOFON` vs `GFZ`). The resolver applies the alias table and
//! only hands out endpoints it actually knows.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, SeisplotError};
use crate::fdsn::Endpoint;

/// Catalog names that differ from the client's labels
pub fn default_aliases() -> BTreeMap<String, String> {
    [
        ("GEOFON", "GFZ"),
        ("USPSC", "USP"),
        ("IRISDMC", "IRIS"),
        ("SED", "ETH"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Known FDSN data centers and their base URLs
pub fn default_endpoints() -> BTreeMap<String, String> {
    [
        ("AUSPASS", "http://auspass.edu.au"),
        ("BGR", "http://eida.bgr.de"),
        ("EIDA", "http://eida-federator.ethz.ch"),
        ("EMSC", "http://www.seismicportal.eu"),
        ("ETH", "http://eida.ethz.ch"),
        ("GEONET", "http://service.geonet.org.nz"),
        ("GFZ", "http://geofon.gfz-potsdam.de"),
        ("ICGC", "http://ws.icgc.cat"),
        ("IESDMC", "http://batsws.earth.sinica.edu.tw"),
        ("INGV", "http://webservices.ingv.it"),
        ("IPGP", "http://ws.ipgp.fr"),
        ("IRIS", "http://service.iris.edu"),
        ("IRISPH5", "http://service.iris.edu"),
        ("ISC", "http://isc-mirror.iris.washington.edu"),
        ("KNMI", "http://rdsa.knmi.nl"),
        ("KOERI", "http://eida.koeri.boun.edu.tr"),
        ("LMU", "http://erde.geophysik.uni-muenchen.de"),
        ("NCEDC", "https://service.ncedc.org"),
        ("NIEP", "http://eida-sc3.infp.ro"),
        ("NOA", "http://eida.gein.noa.gr"),
        ("ODC", "http://www.orfeus-eu.org"),
        ("ORFEUS", "http://www.orfeus-eu.org"),
        ("RASPISHAKE", "https://data.raspberryshake.org"),
        ("RESIF", "http://ws.resif.fr"),
        ("RESIFPH5", "http://ph5ws.resif.fr"),
        ("SCEDC", "http://service.scedc.caltech.edu"),
        ("TEXNET", "http://rtserve.beg.utexas.edu"),
        ("UIB-NORSAR", "http://eida.geo.uib.no"),
        ("USGS", "http://earthquake.usgs.gov"),
        ("USP", "http://sismo.iag.usp.br"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Maps data-center keys to endpoints.
///
/// Tables are immutable after construction and cheap to clone.
#[derive(Debug, Clone)]
pub struct DataCenterResolver {
    aliases: Arc<BTreeMap<String, String>>,
    endpoints: Arc<BTreeMap<String, String>>,
}

impl DataCenterResolver {
    pub fn new(aliases: BTreeMap<String, String>, endpoints: BTreeMap<String, String>) -> Self {
        Self {
            aliases: Arc::new(aliases),
            endpoints: Arc::new(endpoints),
        }
    }

    /// Client label for a key, after alias substitution
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.aliases.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Resolve a key, or `None` if the data center is unavailable
    pub fn resolve(&self, key: &str) -> Option<Endpoint> {
        let label = self.label_for(key);
        self.endpoints.get(label).map(|base_url| Endpoint {
            label: label.to_string(),
            base_url: base_url.clone(),
        })
    }

    /// Resolve a key with error handling
    pub fn resolve_checked(&self, key: &str) -> Result<Endpoint> {
        self.resolve(key)
            .ok_or_else(|| SeisplotError::UnavailableDataCenter {
                data_center: key.to_string(),
            })
    }

    /// Number of endpoints known to the resolver
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

impl Default for DataCenterResolver {
    fn default() -> Self {
        Self::new(default_aliases(), default_endpoints())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_are_substituted() {
        let resolver = DataCenterResolver::default();

        let endpoint = resolver.resolve("GEOFON").unwrap();
        assert_eq!(endpoint.label, "GFZ");
        assert_eq!(endpoint.base_url, "http://geofon.gfz-potsdam.de");

        assert_eq!(resolver.resolve("IRISDMC").unwrap().label, "IRIS");
        assert_eq!(resolver.resolve("SED").unwrap().label, "ETH");
        assert_eq!(resolver.resolve("USPSC").unwrap().label, "USP");
    }

    #[test]
    fn test_direct_labels_resolve() {
        let resolver = DataCenterResolver::default();
        assert_eq!(resolver.resolve("IRIS").unwrap().label, "IRIS");
        assert_eq!(resolver.resolve("UIB-NORSAR").unwrap().label, "UIB-NORSAR");
    }

    #[test]
    fn test_unknown_key_is_unavailable() {
        let resolver = DataCenterResolver::default();
        assert!(resolver.resolve("NOWHERE").is_none());
        assert!(matches!(
            resolver.resolve_checked("NOWHERE"),
            Err(SeisplotError::UnavailableDataCenter { data_center }) if data_center == "NOWHERE"
        ));
    }

    #[test]
    fn test_alias_to_unknown_label_is_unavailable() {
        let mut aliases = BTreeMap::new();
        aliases.insert("OLDNAME".to_string(), "GONE".to_string());
        let resolver = DataCenterResolver::new(aliases, default_endpoints());
        assert!(resolver.resolve("OLDNAME").is_none());
    }
}
