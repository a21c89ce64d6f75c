//! Test data generation utilities.
//!
//! Builds miniSEED volumes for the fake data center.

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

/// Record length exponent used by [`MseedBuilder`] (4096-byte records)
const RECORD_EXPONENT: u8 = 12;

/// Header and blockette 1000 occupy the first 64 bytes
const DATA_OFFSET: usize = 64;

/// Start of the standard test window
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2004, 12, 26, 1, 0, 0).unwrap()
}

/// A sine wave with an amplitude large enough to get a `×10³` axis offset
pub fn sine_samples(count: usize, amplitude: f64) -> Vec<i32> {
    (0..count)
        .map(|i| (amplitude * (i as f64 / 50.0).sin()).round() as i32)
        .collect()
}

/// Builds big-endian INT32 miniSEED records for one channel
#[derive(Debug, Clone)]
pub struct MseedBuilder {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    /// Samples per second (whole numbers only)
    pub sampling_rate: i16,
}

impl MseedBuilder {
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
            sampling_rate: 1,
        }
    }

    fn samples_per_record() -> usize {
        ((1usize << RECORD_EXPONENT) - DATA_OFFSET) / 4
    }

    /// Encode `samples` starting at `start`, split over as many records as needed
    pub fn build(&self, start: DateTime<Utc>, samples: &[i32]) -> Vec<u8> {
        let per_record = Self::samples_per_record();
        let mut volume = Vec::new();
        for (index, chunk) in samples.chunks(per_record).enumerate() {
            let offset_us = (index * per_record) as i64 * 1_000_000 / self.sampling_rate as i64;
            let record_start = start + Duration::microseconds(offset_us);
            volume.extend(self.record(index + 1, record_start, chunk));
        }
        volume
    }

    fn record(&self, sequence: usize, start: DateTime<Utc>, samples: &[i32]) -> Vec<u8> {
        let mut rec = vec![0u8; 1 << RECORD_EXPONENT];
        rec[0..6].copy_from_slice(format!("{:06}", sequence % 1_000_000).as_bytes());
        rec[6] = b'D';
        rec[7] = b' ';
        write_padded(&mut rec[8..13], &self.station);
        write_padded(&mut rec[13..15], &self.location);
        write_padded(&mut rec[15..18], &self.channel);
        write_padded(&mut rec[18..20], &self.network);
        BigEndian::write_u16(&mut rec[20..22], start.year() as u16);
        BigEndian::write_u16(&mut rec[22..24], start.ordinal() as u16);
        rec[24] = start.hour() as u8;
        rec[25] = start.minute() as u8;
        rec[26] = start.second() as u8;
        BigEndian::write_u16(&mut rec[28..30], (start.nanosecond() / 100_000) as u16);
        BigEndian::write_u16(&mut rec[30..32], samples.len() as u16);
        BigEndian::write_i16(&mut rec[32..34], self.sampling_rate);
        BigEndian::write_i16(&mut rec[34..36], 1);
        rec[39] = 1;
        BigEndian::write_u16(&mut rec[44..46], DATA_OFFSET as u16);
        BigEndian::write_u16(&mut rec[46..48], 48);
        // Blockette 1000: INT32, big-endian
        BigEndian::write_u16(&mut rec[48..50], 1000);
        rec[52] = 3;
        rec[53] = 1;
        rec[54] = RECORD_EXPONENT;
        for (i, sample) in samples.iter().enumerate() {
            let at = DATA_OFFSET + i * 4;
            BigEndian::write_i32(&mut rec[at..at + 4], *sample);
        }
        rec
    }
}

fn write_padded(field: &mut [u8], value: &str) {
    field.fill(b' ');
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

/// IU.ANMO.00.LHZ for `seconds` seconds at 1 sample/s from [`test_start`]
pub fn anmo_volume(seconds: usize) -> Vec<u8> {
    MseedBuilder::new("IU", "ANMO", "00", "LHZ").build(test_start(), &sine_samples(seconds, 4000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_is_split_into_records() {
        let volume = anmo_volume(2500);
        assert_eq!(volume.len(), 3 * 4096);
        assert_eq!(&volume[0..7], b"000001D");
        assert_eq!(&volume[4096..4103], b"000002D");
        assert_eq!(BigEndian::read_u16(&volume[4096 + 30..4096 + 32]), 1008);
        assert_eq!(volume[4096 + 25], 16); // minute of second record start
    }
}
