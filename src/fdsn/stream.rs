//! In-memory waveform containers.

use chrono::{DateTime, Duration, Utc};

/// Channel identification and timing for one trace
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStats {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub starttime: DateTime<Utc>,
    /// Samples per second
    pub sampling_rate: f64,
}

/// A contiguous run of samples from a single channel
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub stats: TraceStats,
    pub data: Vec<f64>,
}

impl Trace {
    pub fn new(stats: TraceStats, data: Vec<f64>) -> Self {
        Self { stats, data }
    }

    /// `NET.STA.LOC.CHA`
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.stats.network, self.stats.station, self.stats.location, self.stats.channel
        )
    }

    pub fn npts(&self) -> usize {
        self.data.len()
    }

    /// Seconds between samples (zero for a zero sampling rate)
    pub fn delta(&self) -> f64 {
        if self.stats.sampling_rate > 0.0 {
            1.0 / self.stats.sampling_rate
        } else {
            0.0
        }
    }

    /// Time of the last sample
    pub fn endtime(&self) -> DateTime<Utc> {
        let span = self.delta() * self.npts().saturating_sub(1) as f64;
        self.stats.starttime + Duration::microseconds((span * 1e6).round() as i64)
    }

    /// Time at which the sample following the last one would start
    pub fn next_sample_time(&self) -> DateTime<Utc> {
        let span = self.delta() * self.npts() as f64;
        self.stats.starttime + Duration::microseconds((span * 1e6).round() as i64)
    }

    /// Minimum and maximum sample value, ignoring non-finite samples
    pub fn extent(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// A collection of traces, usually the answer to one waveform request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    pub traces: Vec<Trace>,
}

impl Stream {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn total_samples(&self) -> usize {
        self.traces.iter().map(Trace::npts).sum()
    }

    /// Distinct trace ids, in order of first appearance
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for trace in &self.traces {
            let id = trace.id();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Traces grouped by id, in order of first appearance
    pub fn grouped(&self) -> Vec<(String, Vec<&Trace>)> {
        let mut groups: Vec<(String, Vec<&Trace>)> = Vec::new();
        for trace in &self.traces {
            let id = trace.id();
            match groups.iter_mut().find(|(gid, _)| *gid == id) {
                Some((_, members)) => members.push(trace),
                None => groups.push((id, vec![trace])),
            }
        }
        groups
    }
}
