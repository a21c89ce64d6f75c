//! Scripted in-memory data center for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{
    Endpoint, FdsnError, Service, ServiceConnector, Stream, Trace, TraceStats, WaveformRequest,
    WaveformService,
};

/// What the next waveform request answers
pub enum Reply {
    Data,
    Fail(FdsnError),
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<Reply>>,
    fetches: AtomicUsize,
    connects: AtomicUsize,
    failing_connects: AtomicUsize,
    no_dataselect: bool,
    last_connect: Mutex<Option<(String, String)>>,
}

pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            state: Arc::new(MockState {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }),
        }
    }

    pub fn without_dataselect() -> Self {
        Self {
            state: Arc::new(MockState {
                no_dataselect: true,
                ..Default::default()
            }),
        }
    }

    pub fn failing_connects(self, count: usize) -> Self {
        self.state.failing_connects.store(count, Ordering::SeqCst);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Label and user agent of the last connection attempt
    pub fn last_connect(&self) -> Option<(String, String)> {
        self.state.last_connect.lock().clone()
    }
}

#[async_trait]
impl ServiceConnector for MockConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        user_agent: &str,
    ) -> Result<Box<dyn WaveformService>, FdsnError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        *self.state.last_connect.lock() = Some((endpoint.label.clone(), user_agent.to_string()));

        let failing = self.state.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(FdsnError::Http {
                status: 503,
                message: "Service temporarily unavailable.".to_string(),
            });
        }

        Ok(Box::new(MockService {
            state: self.state.clone(),
            base_url: endpoint.base_url.clone(),
        }))
    }
}

struct MockService {
    state: Arc<MockState>,
    base_url: String,
}

#[async_trait]
impl WaveformService for MockService {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn has_service(&self, service: Service) -> bool {
        !(service == Service::Dataselect && self.state.no_dataselect)
    }

    async fn get_waveforms(&self, request: &WaveformRequest) -> Result<Stream, FdsnError> {
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        let reply = self.state.replies.lock().pop_front().unwrap_or(Reply::Data);
        match reply {
            Reply::Data => Ok(sample_stream(request)),
            Reply::Fail(e) => Err(e),
        }
    }
}

/// One trace at 1 sample/s covering the request window
pub fn sample_stream(request: &WaveformRequest) -> Stream {
    let npts = request.time_range.duration_secs().max(1.0) as usize;
    let data = (0..npts)
        .map(|i| 5000.0 * (i as f64 / 60.0).sin())
        .collect();
    Stream::new(vec![Trace::new(
        TraceStats {
            network: request.network.clone(),
            station: request.station.clone(),
            location: request.location.clone(),
            channel: request.channel.clone(),
            starttime: request.start(),
            sampling_rate: 1.0,
        },
        data,
    )])
}
