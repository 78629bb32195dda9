//! An in-memory MediaIo double: plain byte buffers and pixel matrices
//! instead of a real demuxer/decoder/muxer. Used by unit and scenario
//! tests throughout the core pipeline (spec.md §9 option (b)).
//!
//! SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{
    build_stream_mapping, DecoderHandle, Frame, InputHandle, MediaError, MediaIo, OutputHandle,
    Packet, PixelFormat, Plane, Rational, StreamInfo, StreamMapping,
};

/// A scripted input: a fixed list of packets to hand back from
/// `read_packet`, in order, then `MediaError::EndOfStream`.
pub struct MockInput {
    streams: Vec<StreamInfo>,
    packets: std::vec::IntoIter<Packet>,
    read_delay: Duration,
}

impl MockInput {
    pub fn new(streams: Vec<StreamInfo>, packets: Vec<Packet>) -> Self {
        Self { streams, packets: packets.into_iter(), read_delay: Duration::ZERO }
    }

    /// Emits packets slowly, simulating a live RTSP source, so a concurrent
    /// shutdown has a window to land between reads.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }
}

impl InputHandle for MockInput {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Packet, MediaError> {
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        self.packets.next().ok_or(MediaError::EndOfStream)
    }
}

/// Every packet written through a `MockOutput`, for assertions in tests.
#[derive(Default)]
pub struct MockOutputLog {
    pub written: Vec<Packet>,
}

pub struct MockOutput {
    mapping: StreamMapping,
    /// `codec_id` of the input stream each output stream index was created
    /// as a copy of, mirroring a real muxer's "new output stream = copy of
    /// input codec parameters" (spec.md §4.1). Lets tests assert the
    /// StreamMapping round-trip property (spec.md §8 property 4).
    stream_codec_ids: HashMap<u32, String>,
    log: Arc<Mutex<MockOutputLog>>,
    closed_log: Arc<Mutex<Vec<Vec<Packet>>>>,
}

impl MockOutput {
    /// The codec_id the output stream at `output_index` was created from, if
    /// that index was ever populated by `open_output`.
    pub fn codec_id(&self, output_index: u32) -> Option<&str> {
        self.stream_codec_ids.get(&output_index).map(String::as_str)
    }
}

impl OutputHandle for MockOutput {
    fn mapping(&self) -> &StreamMapping {
        &self.mapping
    }

    fn write_packet(&mut self, _input_time_base: Rational, packet: &Packet) -> Result<(), MediaError> {
        self.log.lock().unwrap().written.push(packet.clone());
        Ok(())
    }

    fn close(self) -> Result<(), MediaError> {
        let written = std::mem::take(&mut self.log.lock().unwrap().written);
        self.closed_log.lock().unwrap().push(written);
        Ok(())
    }
}

/// A decoder whose "decoded frames" are supplied up front by the test,
/// keyed by packet content rather than actually parsing bitstreams.
pub struct MockDecoder {
    frames_by_payload: HashMap<Vec<u8>, Vec<Frame>>,
    fail_on: std::collections::HashSet<Vec<u8>>,
}

impl DecoderHandle for MockDecoder {
    fn decode_keyframe(&mut self, packet: &Packet) -> Result<Vec<Frame>, MediaError> {
        let key = packet.data.to_vec();
        if self.fail_on.contains(&key) {
            return Err(MediaError::DecoderFailed { reason: "scripted failure".into() });
        }
        Ok(self.frames_by_payload.get(&key).cloned().unwrap_or_default())
    }
}

/// The MediaIo implementation itself. Scripted with the frames each
/// keyframe packet should decode to; `open_output` records every packet
/// written to it (and every output it has ever closed) for assertions.
#[derive(Default, Clone)]
pub struct MockMedia {
    frames_by_payload: Arc<Mutex<HashMap<Vec<u8>, Vec<Frame>>>>,
    fail_on: Arc<Mutex<std::collections::HashSet<Vec<u8>>>>,
    outputs_opened: Arc<Mutex<Vec<Arc<Mutex<MockOutputLog>>>>>,
    closed_segments: Arc<Mutex<Vec<Vec<Packet>>>>,
    fail_output_open: Arc<Mutex<bool>>,
    remaining_input_failures: Arc<Mutex<usize>>,
    open_input_attempts: Arc<Mutex<usize>>,
    input_streams: Arc<Mutex<Vec<StreamInfo>>>,
    input_packets: Arc<Mutex<Vec<Packet>>>,
    input_read_delay: Arc<Mutex<Duration>>,
    new_decoder_calls: Arc<Mutex<usize>>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers that decoding `packet_payload` should yield `frames`.
    pub fn script_frame(&self, packet_payload: &[u8], frame: Frame) {
        self.frames_by_payload
            .lock()
            .unwrap()
            .entry(packet_payload.to_vec())
            .or_default()
            .push(frame);
    }

    pub fn script_decode_failure(&self, packet_payload: &[u8]) {
        self.fail_on.lock().unwrap().insert(packet_payload.to_vec());
    }

    pub fn set_fail_output_open(&self, fail: bool) {
        *self.fail_output_open.lock().unwrap() = fail;
    }

    /// The next `count` calls to `open_input` fail with `NetworkOpen`;
    /// calls after that succeed.
    pub fn script_input_open_failures(&self, count: usize) {
        *self.remaining_input_failures.lock().unwrap() = count;
    }

    pub fn open_input_attempts(&self) -> usize {
        *self.open_input_attempts.lock().unwrap()
    }

    /// Packets a successful `open_input` hands back, in order, followed by
    /// `EndOfStream`; defaults to an empty stream with no packets.
    pub fn script_input_packets(&self, streams: Vec<StreamInfo>, packets: Vec<Packet>) {
        *self.input_streams.lock().unwrap() = streams;
        *self.input_packets.lock().unwrap() = packets;
    }

    /// Delay `read_packet` sleeps before returning each scripted packet.
    pub fn set_input_read_delay(&self, delay: Duration) {
        *self.input_read_delay.lock().unwrap() = delay;
    }

    /// Every packet written to every output that has since been closed,
    /// one Vec per closed segment, in close order.
    pub fn closed_segments(&self) -> Vec<Vec<Packet>> {
        self.closed_segments.lock().unwrap().clone()
    }

    pub fn open_output_count(&self) -> usize {
        self.outputs_opened.lock().unwrap().len()
    }

    /// Number of times `new_decoder` has been called, e.g. to assert a
    /// decoder (and the classifier owning it) was not torn down and rebuilt
    /// across a reconnect.
    pub fn new_decoder_call_count(&self) -> usize {
        *self.new_decoder_calls.lock().unwrap()
    }
}

impl MediaIo for MockMedia {
    type Input = MockInput;
    type Output = MockOutput;
    type Decoder = MockDecoder;

    fn open_input(&self, url: &str) -> Result<Self::Input, MediaError> {
        *self.open_input_attempts.lock().unwrap() += 1;
        let mut remaining = self.remaining_input_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(MediaError::NetworkOpen { url: url.to_string(), reason: "scripted failure".into() });
        }
        let streams = self.input_streams.lock().unwrap().clone();
        let packets = self.input_packets.lock().unwrap().clone();
        let delay = *self.input_read_delay.lock().unwrap();
        Ok(MockInput::new(streams, packets).with_read_delay(delay))
    }

    fn open_output(
        &self,
        _format: &str,
        url: &str,
        input: &Self::Input,
        _options: &HashMap<String, String>,
    ) -> Result<Self::Output, MediaError> {
        if *self.fail_output_open.lock().unwrap() {
            return Err(MediaError::OutputOpen { url: url.to_string(), reason: "scripted failure".into() });
        }
        let mapping = build_stream_mapping(input.streams());
        let mut stream_codec_ids = HashMap::new();
        for stream in input.streams() {
            if let Some(out_index) = mapping.get(stream.index) {
                stream_codec_ids.insert(out_index, stream.codec_id.clone());
            }
        }
        let log = Arc::new(Mutex::new(MockOutputLog::default()));
        self.outputs_opened.lock().unwrap().push(log.clone());
        Ok(MockOutput { mapping, stream_codec_ids, log, closed_log: self.closed_segments.clone() })
    }

    fn new_decoder(&self, _input: &Self::Input, _stream_index: usize) -> Result<Self::Decoder, MediaError> {
        *self.new_decoder_calls.lock().unwrap() += 1;
        Ok(MockDecoder {
            frames_by_payload: self.frames_by_payload.lock().unwrap().clone(),
            fail_on: self.fail_on.lock().unwrap().clone(),
        })
    }
}

/// Convenience constructor for a 4:2:0 test frame filled with one uniform
/// byte value per plane, used by comparator/classifier tests.
pub fn solid_frame(width: u32, height: u32, y: u8, u: u8, v: u8) -> Frame {
    let luma_len = (width * height) as usize;
    let chroma_w = width / 2;
    let chroma_h = height / 2;
    let chroma_len = (chroma_w * chroma_h) as usize;
    Frame {
        format: PixelFormat::Yuv420Studio,
        width,
        height,
        planes: vec![
            Plane { data: vec![y; luma_len].into(), stride: width as usize },
            Plane { data: vec![u; chroma_len].into(), stride: chroma_w as usize },
            Plane { data: vec![v; chroma_len].into(), stride: chroma_w as usize },
        ],
    }
}

/// Builds a synthetic video keyframe packet carrying `payload` as its data
/// (the mock decoder keys scripted frames off this payload).
pub fn video_keyframe(stream_index: usize, pts: i64, payload: Vec<u8>) -> Packet {
    Packet {
        stream_index,
        pts,
        dts: pts,
        duration: 1,
        is_keyframe: true,
        is_video: true,
        data: payload.into(),
        time_base: Rational::new(1, 90000),
    }
}

/// Builds a synthetic non-keyframe video packet.
pub fn video_delta(stream_index: usize, pts: i64, payload: Vec<u8>) -> Packet {
    Packet {
        stream_index,
        pts,
        dts: pts,
        duration: 1,
        is_keyframe: false,
        is_video: true,
        data: payload.into(),
        time_base: Rational::new(1, 90000),
    }
}
