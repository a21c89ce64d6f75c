//! A fake FDSN data center backed by wiremock.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DATASELECT_QUERY: &str = "/fdsnws/dataselect/1/query";

/// Start a data center advertising `services` (e.g. `dataselect`, `station`)
pub async fn start(services: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    for service in services {
        Mock::given(method("GET"))
            .and(path(format!("/fdsnws/{}/1/version", service)))
            .respond_with(ResponseTemplate::new(200).set_body_string("1.1.0"))
            .mount(&server)
            .await;
    }
    server
}

/// Make `service`'s version endpoint answer with `status`
pub async fn break_service(server: &MockServer, service: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/fdsnws/{}/1/version", service)))
        .respond_with(ResponseTemplate::new(status).set_body_string("Service unavailable"))
        .mount(server)
        .await;
}

/// Answer every waveform query with `volume`
pub async fn serve_waveforms(server: &MockServer, volume: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(DATASELECT_QUERY))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/vnd.fdsn.mseed")
                .set_body_bytes(volume),
        )
        .mount(server)
        .await;
}

/// Answer waveform queries with `status`, at most `times` times if given
pub async fn fail_waveforms(server: &MockServer, status: u16, body: &str, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(DATASELECT_QUERY))
        .respond_with(ResponseTemplate::new(status).set_body_string(body));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n).with_priority(1),
        None => mock,
    };
    mock.mount(server).await;
}

/// Number of waveform queries the data center received
pub async fn waveform_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == DATASELECT_QUERY)
        .count()
}

/// User agent of the last waveform query
pub async fn last_user_agent(server: &MockServer) -> Option<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == DATASELECT_QUERY)
        .last()
        .and_then(|r| r.headers.get("user-agent"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
