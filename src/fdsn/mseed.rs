//! miniSEED 2.x record decoding.
//!
//! Supports the encodings FDSN dataselect services actually return:
//! INT16, INT32, FLOAT32, FLOAT64, Steim-1 and Steim-2. ASCII (log) records
//! carry no samples and are skipped.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use super::stream::{Stream, Trace, TraceStats};

/// Size of the fixed section of the data header
pub const FIXED_HEADER_LEN: usize = 48;

const STEIM_FRAME_LEN: usize = 64;

/// Errors raised while decoding miniSEED
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MseedError {
    #[error("record truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid record header at offset {offset}: {message}")]
    InvalidHeader { offset: usize, message: String },

    #[error("unsupported data encoding {0}")]
    UnsupportedEncoding(u8),

    #[error("payload too short for {expected} samples")]
    ShortPayload { expected: usize },

    #[error("Steim decompression failed: {0}")]
    Steim(String),
}

/// Data encodings from blockette 1000
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ascii,
    Int16,
    Int32,
    Float32,
    Float64,
    Steim1,
    Steim2,
}

impl Encoding {
    pub fn from_code(code: u8) -> Result<Self, MseedError> {
        match code {
            0 => Ok(Encoding::Ascii),
            1 => Ok(Encoding::Int16),
            3 => Ok(Encoding::Int32),
            4 => Ok(Encoding::Float32),
            5 => Ok(Encoding::Float64),
            10 => Ok(Encoding::Steim1),
            11 => Ok(Encoding::Steim2),
            other => Err(MseedError::UnsupportedEncoding(other)),
        }
    }
}

/// One decoded data record
#[derive(Debug, Clone)]
pub struct Record {
    pub stats: TraceStats,
    pub samples: Vec<f64>,
    pub record_length: usize,
}

/// Decode a byte buffer of concatenated records into a stream.
///
/// Contiguous records of the same channel become a single trace.
pub fn decode(bytes: &[u8]) -> Result<Stream, MseedError> {
    let mut traces: Vec<Trace> = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let remaining = &bytes[offset..];
        if remaining.len() < FIXED_HEADER_LEN {
            if remaining.iter().all(|b| *b == 0) {
                break;
            }
            return Err(MseedError::Truncated { offset });
        }

        let record = if is_big_endian(remaining) {
            parse_record::<BigEndian>(remaining, offset)?
        } else if is_plausible_header::<LittleEndian>(remaining) {
            parse_record::<LittleEndian>(remaining, offset)?
        } else {
            return Err(MseedError::InvalidHeader {
                offset,
                message: "unable to detect byte order".to_string(),
            });
        };

        offset += record.record_length;
        if record.samples.is_empty() {
            continue;
        }
        append_record(&mut traces, record);
    }

    debug!(
        bytes = bytes.len(),
        traces = traces.len(),
        "Decoded miniSEED"
    );
    Ok(Stream::new(traces))
}

fn is_big_endian(header: &[u8]) -> bool {
    is_plausible_header::<BigEndian>(header)
}

fn is_plausible_header<B: ByteOrder>(header: &[u8]) -> bool {
    let year = B::read_u16(&header[20..22]);
    let day = B::read_u16(&header[22..24]);
    (1900..=2100).contains(&year) && (1..=366).contains(&day)
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Sample rate from the header factor and multiplier
pub fn sample_rate(factor: i16, multiplier: i16) -> f64 {
    let f = factor as f64;
    let m = multiplier as f64;
    match (factor, multiplier) {
        (0, _) | (_, 0) => 0.0,
        (fa, mu) if fa > 0 && mu > 0 => f * m,
        (fa, _) if fa > 0 => -f / m,
        (_, mu) if mu > 0 => -m / f,
        _ => 1.0 / (f * m),
    }
}

fn parse_record<B: ByteOrder>(rec: &[u8], offset: usize) -> Result<Record, MseedError> {
    let invalid = |message: &str| MseedError::InvalidHeader {
        offset,
        message: message.to_string(),
    };

    if !matches!(rec[6], b'D' | b'R' | b'Q' | b'M') {
        return Err(invalid("unknown data quality indicator"));
    }

    let station = ascii_field(&rec[8..13]);
    let location = ascii_field(&rec[13..15]);
    let channel = ascii_field(&rec[15..18]);
    let network = ascii_field(&rec[18..20]);

    let year = B::read_u16(&rec[20..22]);
    let day = B::read_u16(&rec[22..24]);
    let (hour, minute, second) = (rec[24], rec[25], rec[26]);
    let fract = B::read_u16(&rec[28..30]);

    let nsamples = B::read_u16(&rec[30..32]) as usize;
    let factor = B::read_i16(&rec[32..34]);
    let multiplier = B::read_i16(&rec[34..36]);
    let activity = rec[36];
    let nblockettes = rec[39];
    let time_correction = B::read_i32(&rec[40..44]);
    let data_offset = B::read_u16(&rec[44..46]) as usize;
    let mut next = B::read_u16(&rec[46..48]) as usize;

    let mut blockette_1000 = None;
    let mut microseconds = 0i64;
    let mut seen = 0;
    while next != 0 && seen < nblockettes.max(1) {
        if next + 4 > rec.len() {
            return Err(MseedError::Truncated { offset: offset + next });
        }
        let kind = B::read_u16(&rec[next..next + 2]);
        let following = B::read_u16(&rec[next + 2..next + 4]) as usize;
        match kind {
            1000 if next + 7 <= rec.len() => {
                blockette_1000 = Some((rec[next + 4], rec[next + 5], rec[next + 6]));
            }
            1001 if next + 6 <= rec.len() => {
                microseconds = rec[next + 5] as i8 as i64;
            }
            _ => {}
        }
        seen += 1;
        if following != 0 && following <= next {
            return Err(invalid("blockette chain does not advance"));
        }
        next = following;
    }

    let (encoding_code, word_order, length_exponent) =
        blockette_1000.ok_or_else(|| invalid("missing blockette 1000"))?;
    if !(7..=20).contains(&length_exponent) {
        return Err(invalid("implausible record length"));
    }
    let record_length = 1usize << length_exponent;
    if rec.len() < record_length {
        return Err(MseedError::Truncated { offset });
    }
    if data_offset > record_length || (nsamples > 0 && data_offset < FIXED_HEADER_LEN) {
        return Err(invalid("data offset outside record"));
    }

    let date = NaiveDate::from_yo_opt(year as i32, day as u32)
        .ok_or_else(|| invalid("invalid start day"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| invalid("invalid start time"))?
        .and_utc();
    // Leap seconds (second == 60) simply roll over.
    let mut starttime: DateTime<Utc> = midnight
        + Duration::seconds(hour as i64 * 3600 + minute as i64 * 60 + second as i64)
        + Duration::microseconds(fract as i64 * 100 + microseconds);
    if activity & 0x02 == 0 {
        starttime += Duration::microseconds(time_correction as i64 * 100);
    }

    let encoding = Encoding::from_code(encoding_code)?;
    let payload = &rec[data_offset.min(record_length)..record_length];
    let samples = if nsamples == 0 || encoding == Encoding::Ascii {
        Vec::new()
    } else if word_order == 1 {
        decode_samples::<BigEndian>(encoding, payload, nsamples)?
    } else {
        decode_samples::<LittleEndian>(encoding, payload, nsamples)?
    };

    Ok(Record {
        stats: TraceStats {
            network,
            station,
            location,
            channel,
            starttime,
            sampling_rate: sample_rate(factor, multiplier),
        },
        samples,
        record_length,
    })
}

fn decode_samples<B: ByteOrder>(
    encoding: Encoding,
    payload: &[u8],
    nsamples: usize,
) -> Result<Vec<f64>, MseedError> {
    let fixed = |width: usize| -> Result<(), MseedError> {
        if payload.len() < width * nsamples {
            Err(MseedError::ShortPayload { expected: nsamples })
        } else {
            Ok(())
        }
    };

    match encoding {
        Encoding::Ascii => Ok(Vec::new()),
        Encoding::Int16 => {
            fixed(2)?;
            Ok(payload
                .chunks_exact(2)
                .take(nsamples)
                .map(|c| B::read_i16(c) as f64)
                .collect())
        }
        Encoding::Int32 => {
            fixed(4)?;
            Ok(payload
                .chunks_exact(4)
                .take(nsamples)
                .map(|c| B::read_i32(c) as f64)
                .collect())
        }
        Encoding::Float32 => {
            fixed(4)?;
            Ok(payload
                .chunks_exact(4)
                .take(nsamples)
                .map(|c| B::read_f32(c) as f64)
                .collect())
        }
        Encoding::Float64 => {
            fixed(8)?;
            Ok(payload
                .chunks_exact(8)
                .take(nsamples)
                .map(B::read_f64)
                .collect())
        }
        Encoding::Steim1 => decode_steim::<B>(payload, nsamples, SteimLevel::One),
        Encoding::Steim2 => decode_steim::<B>(payload, nsamples, SteimLevel::Two),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SteimLevel {
    One,
    Two,
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn unpack(word: u32, bits: u32, count: u32, diffs: &mut Vec<i32>) {
    let mask = (1u32 << bits) - 1;
    for i in (0..count).rev() {
        diffs.push(sign_extend((word >> (i * bits)) & mask, bits));
    }
}

fn decode_steim<B: ByteOrder>(
    payload: &[u8],
    nsamples: usize,
    level: SteimLevel,
) -> Result<Vec<f64>, MseedError> {
    let mut diffs: Vec<i32> = Vec::with_capacity(nsamples + 8);
    let mut first = None;
    let mut last = None;

    for (frame_index, frame) in payload.chunks_exact(STEIM_FRAME_LEN).enumerate() {
        let control = B::read_u32(&frame[0..4]);
        for w in 1..16 {
            let word_bytes = &frame[w * 4..w * 4 + 4];
            if frame_index == 0 && w == 1 {
                first = Some(B::read_i32(word_bytes));
                continue;
            }
            if frame_index == 0 && w == 2 {
                last = Some(B::read_i32(word_bytes));
                continue;
            }

            let nibble = (control >> (30 - 2 * w as u32)) & 0x3;
            let word = B::read_u32(word_bytes);
            match (level, nibble) {
                (_, 0) => {}
                (_, 1) => diffs.extend(word_bytes.iter().map(|b| *b as i8 as i32)),
                (SteimLevel::One, 2) => {
                    diffs.push(B::read_i16(&word_bytes[0..2]) as i32);
                    diffs.push(B::read_i16(&word_bytes[2..4]) as i32);
                }
                (SteimLevel::One, _) => diffs.push(word as i32),
                (SteimLevel::Two, 2) => match word >> 30 {
                    1 => unpack(word, 30, 1, &mut diffs),
                    2 => unpack(word, 15, 2, &mut diffs),
                    3 => unpack(word, 10, 3, &mut diffs),
                    _ => return Err(MseedError::Steim("invalid Steim-2 dnib 00 for nibble 10".into())),
                },
                (SteimLevel::Two, _) => match word >> 30 {
                    0 => unpack(word, 6, 5, &mut diffs),
                    1 => unpack(word, 5, 6, &mut diffs),
                    2 => unpack(word, 4, 7, &mut diffs),
                    _ => return Err(MseedError::Steim("invalid Steim-2 dnib 11 for nibble 11".into())),
                },
            }
        }
        if diffs.len() >= nsamples {
            break;
        }
    }

    let first = first.ok_or_else(|| MseedError::Steim("no data frames".to_string()))?;
    if diffs.len() < nsamples {
        return Err(MseedError::Steim(format!(
            "expected {} samples, frames hold {}",
            nsamples,
            diffs.len()
        )));
    }

    let mut samples = Vec::with_capacity(nsamples);
    let mut current = first as i64;
    samples.push(current as f64);
    for diff in diffs.iter().take(nsamples).skip(1) {
        current += *diff as i64;
        samples.push(current as f64);
    }

    if let Some(last) = last {
        if current != last as i64 {
            warn!(
                expected = last,
                actual = current,
                "Steim reverse integration constant mismatch"
            );
        }
    }

    Ok(samples)
}

fn append_record(traces: &mut Vec<Trace>, record: Record) {
    if let Some(trace) = traces.last_mut() {
        let same_channel = trace.stats.network == record.stats.network
            && trace.stats.station == record.stats.station
            && trace.stats.location == record.stats.location
            && trace.stats.channel == record.stats.channel
            && (trace.stats.sampling_rate - record.stats.sampling_rate).abs() < 1e-9;
        if same_channel {
            let gap = crate::time_range::seconds_between(
                trace.next_sample_time(),
                record.stats.starttime,
            );
            if gap.abs() <= trace.delta() / 2.0 {
                trace.data.extend(record.samples);
                return;
            }
        }
    }
    traces.push(Trace::new(record.stats, record.samples));
}
