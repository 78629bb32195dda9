//! MediaIO: a thin abstraction over demuxer/decoder/muxer primitives.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! The real implementation (`media::ffmpeg`) binds `ffmpeg-next`. The core
//! pipeline (packet_queue, comparator, motion, recorder, live, worker) is
//! written against the `MediaIo` trait so it can run, and be tested, against
//! `media::mock::MockMedia` without any FFI.

use std::collections::HashMap;

use bytes::Bytes;

pub mod mock;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

/// Capacity of a `StreamMapping`: only this many input streams can be mapped
/// to an output at once. Matches the original implementation's
/// `#define MAX_STREAMS 4`.
pub const MAX_STREAMS: usize = 4;

/// A rational time unit, e.g. a stream's time_base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }
}

/// A sentinel PTS/DTS value that must pass through rescaling unchanged,
/// mirroring `AV_NOPTS_VALUE`.
pub const NOPTS_VALUE: i64 = i64::MIN;

/// Rescale a timestamp from one time_base to another using nearest rounding,
/// passing sentinel min/max values through unchanged.
///
/// Grounded in `av_rescale_q_rnd(..., AV_ROUND_NEAR_INF|AV_ROUND_PASS_MINMAX)`
/// (see `original_source/src/zcamera.c:outputWrite`).
pub fn rescale_ts(value: i64, from: Rational, to: Rational) -> i64 {
    if value == NOPTS_VALUE || value == i64::MAX {
        return value;
    }
    if from == to {
        return value;
    }
    // value * from.num/from.den * to.den/to.num, nearest rounding.
    let numerator = (value as i128) * (from.num as i128) * (to.den as i128);
    let denominator = (from.den as i128) * (to.num as i128);
    if denominator == 0 {
        return value;
    }
    let half = denominator / 2;
    let rescaled = if (numerator >= 0) == (denominator >= 0) {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    rescaled as i64
}

/// An encoded media unit. Cheaply clonable: cloning is the "refcount
/// increment" spec.md calls for, and dropping the last clone is the release.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream_index: usize,
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub is_keyframe: bool,
    pub is_video: bool,
    pub data: Bytes,
    pub time_base: Rational,
}

/// 4:2:0 planar YUV pixel layouts the comparator understands, plus a
/// catch-all for anything else (which always fails comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv420Jpeg,
    Yuv420Studio,
    Other,
}

impl PixelFormat {
    pub fn is_planar_420(self) -> bool {
        matches!(self, PixelFormat::Yuv420Jpeg | PixelFormat::Yuv420Studio)
    }
}

/// One decoded plane: owned bytes plus the stride used to index them.
#[derive(Debug, Clone)]
pub struct Plane {
    pub data: Bytes,
    pub stride: usize,
}

/// A decoded picture. Only 4:2:0 planar YUV is accepted by the comparator;
/// anything else fails comparison with a typed reason.
#[derive(Debug, Clone)]
pub struct Frame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub planes: Vec<Plane>,
}

/// For one output, maps each input stream index to an output stream index,
/// or to nothing ("drop"). Bounded at `MAX_STREAMS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamMapping {
    slots: [Option<u32>; MAX_STREAMS],
}

impl StreamMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, input_index: usize, output_index: u32) {
        if input_index < MAX_STREAMS {
            self.slots[input_index] = Some(output_index);
        }
    }

    pub fn get(&self, input_index: usize) -> Option<u32> {
        self.slots.get(input_index).copied().flatten()
    }
}

/// Errors MediaIO calls may surface. Behavior, not exhaustive FFI detail:
/// each variant corresponds to a distinct failure mode named in spec.md §4.1.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to open input {url}: {reason}")]
    NetworkOpen { url: String, reason: String },
    #[error("no usable streams in {url}")]
    NoStreams { url: String },
    #[error("timed out waiting on {url}")]
    Timeout { url: String },
    #[error("end of stream")]
    EndOfStream,
    #[error("failed to open output {url}: {reason}")]
    OutputOpen { url: String, reason: String },
    #[error("failed to write packet: {reason}")]
    WriteFailed { reason: String },
    #[error("decoder failure: {reason}")]
    DecoderFailed { reason: String },
    #[error("other media error: {0}")]
    Other(String),
}

/// One input stream's static properties, as needed to create an output
/// stream mirroring it and to decode its keyframes.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    pub is_video: bool,
    pub is_audio: bool,
    pub codec_id: String,
    pub time_base: Rational,
}

/// Handle to an opened input: the demuxer side of MediaIO.
pub trait InputHandle {
    fn streams(&self) -> &[StreamInfo];
    fn read_packet(&mut self) -> Result<Packet, MediaError>;
}

/// Handle to an opened output: the muxer side of MediaIO.
pub trait OutputHandle {
    fn mapping(&self) -> &StreamMapping;
    fn write_packet(&mut self, input_time_base: Rational, packet: &Packet) -> Result<(), MediaError>;
    fn close(self) -> Result<(), MediaError>;
}

/// A keyframe-only decoder bound to one input stream.
pub trait DecoderHandle {
    fn decode_keyframe(&mut self, packet: &Packet) -> Result<Vec<Frame>, MediaError>;
}

/// The MediaIO contract: open_input, open_output, new_decoder. Per-handle
/// operations (read/write/decode/close) live on the associated types.
pub trait MediaIo {
    type Input: InputHandle;
    type Output: OutputHandle;
    type Decoder: DecoderHandle;

    fn open_input(&self, url: &str) -> Result<Self::Input, MediaError>;

    fn open_output(
        &self,
        format: &str,
        url: &str,
        input: &Self::Input,
        options: &HashMap<String, String>,
    ) -> Result<Self::Output, MediaError>;

    fn new_decoder(&self, input: &Self::Input, stream_index: usize) -> Result<Self::Decoder, MediaError>;
}

/// Builds a StreamMapping from a set of input streams, mapping video and
/// audio streams (in order, up to MAX_STREAMS) and dropping the rest.
pub fn build_stream_mapping(streams: &[StreamInfo]) -> StreamMapping {
    let mut mapping = StreamMapping::new();
    let mut next_output = 0u32;
    for stream in streams {
        if !(stream.is_video || stream.is_audio) {
            continue;
        }
        if stream.index >= MAX_STREAMS {
            continue;
        }
        mapping.set(stream.index, next_output);
        next_output += 1;
    }
    mapping
}
