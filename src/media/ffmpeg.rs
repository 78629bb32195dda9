//! Real MediaIO backend, bound to `ffmpeg-next`.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! This module is the "FFI details of the media framework" spec.md §1
//! declares out of scope: it exists so the binary can talk to real RTSP
//! cameras and real muxers, but it carries no unit tests of its own — the
//! core pipeline is tested exclusively against `media::mock::MockMedia`.
//! Grounded in `tlc-core/src/video/decode.rs`'s decoder setup and in
//! `original_source/src/zcamera.c`'s `openCamera`/`outputOpen`/`outputWrite`.

use std::collections::HashMap;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;

use super::{
    build_stream_mapping, DecoderHandle, Frame, InputHandle, MediaError, MediaIo, OutputHandle,
    Packet, PixelFormat, Plane, Rational, StreamInfo, StreamMapping,
};

/// Initializes the ffmpeg-next global state. Safe to call more than once.
pub fn init() -> Result<(), MediaError> {
    ffmpeg::init().map_err(|e| MediaError::Other(e.to_string()))
}

fn to_rational(r: ffmpeg::Rational) -> Rational {
    Rational::new(r.0, r.1)
}

/// Chooses the first 4:2:0 JPEG-range format if offered, else the first
/// 4:2:0 studio-range format, else the first offered format.
///
/// Resolves spec.md §9's open question ("prefer first vs. last") in favor
/// of "first," matching `camNegotiateDecodePixelFormat` in
/// `original_source/src/zcamera.c`.
pub fn negotiate_pixel_format(offered: &[Pixel]) -> Option<Pixel> {
    offered
        .iter()
        .find(|f| **f == Pixel::YUVJ420P)
        .or_else(|| offered.iter().find(|f| **f == Pixel::YUV420P))
        .or_else(|| offered.first())
        .copied()
}

fn pixel_format_of(fmt: Pixel) -> PixelFormat {
    match fmt {
        Pixel::YUVJ420P => PixelFormat::Yuv420Jpeg,
        Pixel::YUV420P => PixelFormat::Yuv420Studio,
        _ => PixelFormat::Other,
    }
}

pub struct FfmpegMedia;

impl FfmpegMedia {
    pub fn new() -> Self {
        FfmpegMedia
    }
}

impl Default for FfmpegMedia {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FfmpegInput {
    ctx: ffmpeg::format::context::Input,
    streams: Vec<StreamInfo>,
}

impl InputHandle for FfmpegInput {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Packet, MediaError> {
        let (stream, packet) = self
            .ctx
            .packets()
            .next()
            .ok_or(MediaError::EndOfStream)?
            .map_err(|e| MediaError::Other(e.to_string()))
            .map(|(s, p)| (s.index(), p))?;
        let time_base = self
            .streams
            .iter()
            .find(|s| s.index == stream)
            .map(|s| s.time_base)
            .unwrap_or(Rational::new(1, 1));
        Ok(Packet {
            stream_index: stream,
            pts: packet.pts().unwrap_or(super::NOPTS_VALUE),
            dts: packet.dts().unwrap_or(super::NOPTS_VALUE),
            duration: packet.duration(),
            is_keyframe: packet.is_key(),
            is_video: self.streams.iter().any(|s| s.index == stream && s.is_video),
            data: bytes::Bytes::copy_from_slice(packet.data().unwrap_or(&[])),
            time_base,
        })
    }
}

pub struct FfmpegOutput {
    ctx: ffmpeg::format::context::Output,
    mapping: StreamMapping,
}

impl OutputHandle for FfmpegOutput {
    fn mapping(&self) -> &StreamMapping {
        &self.mapping
    }

    fn write_packet(&mut self, input_time_base: Rational, packet: &Packet) -> Result<(), MediaError> {
        let Some(out_index) = self.mapping.get(packet.stream_index) else {
            return Ok(());
        };
        let out_time_base = to_rational(self.ctx.stream(out_index as usize).unwrap().time_base());
        let mut av_packet = ffmpeg::Packet::copy(&packet.data);
        av_packet.set_stream(out_index as usize);
        av_packet.set_pts(Some(super::rescale_ts(packet.pts, input_time_base, out_time_base)));
        av_packet.set_dts(Some(super::rescale_ts(packet.dts, input_time_base, out_time_base)));
        av_packet.set_duration(super::rescale_ts(packet.duration, input_time_base, out_time_base));
        av_packet
            .write_interleaved(&mut self.ctx)
            .map_err(|e| MediaError::WriteFailed { reason: e.to_string() })
    }

    fn close(mut self) -> Result<(), MediaError> {
        self.ctx
            .write_trailer()
            .map_err(|e| MediaError::Other(e.to_string()))
    }
}

pub struct FfmpegDecoder {
    decoder: ffmpeg::decoder::Video,
}

impl DecoderHandle for FfmpegDecoder {
    fn decode_keyframe(&mut self, packet: &Packet) -> Result<Vec<Frame>, MediaError> {
        let mut av_packet = ffmpeg::Packet::copy(&packet.data);
        av_packet.set_pts(Some(packet.pts));
        av_packet.set_dts(Some(packet.dts));
        self.decoder
            .send_packet(&av_packet)
            .map_err(|e| MediaError::DecoderFailed { reason: e.to_string() })?;

        let mut frames = Vec::new();
        let mut decoded = ffmpeg::frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            frames.push(convert_frame(&decoded));
        }
        Ok(frames)
    }
}

/// Wraps a decoded frame as-is, in whatever pixel format the decoder
/// negotiated at open time (see `new_decoder`'s `get_format` preference).
/// Anything other than 4:2:0 JPEG/studio range maps to `PixelFormat::Other`,
/// which the comparator rejects with `CompareError::UnsupportedFormat`.
fn convert_frame(decoded: &ffmpeg::frame::Video) -> Frame {
    let format = pixel_format_of(decoded.format());
    let planes = (0..decoded.planes())
        .map(|i| Plane { data: bytes::Bytes::copy_from_slice(decoded.data(i)), stride: decoded.stride(i) })
        .collect();
    Frame { format, width: decoded.width(), height: decoded.height(), planes }
}

impl MediaIo for FfmpegMedia {
    type Input = FfmpegInput;
    type Output = FfmpegOutput;
    type Decoder = FfmpegDecoder;

    fn open_input(&self, url: &str) -> Result<Self::Input, MediaError> {
        let ctx = ffmpeg::format::input(&url).map_err(|e| MediaError::NetworkOpen {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let streams: Vec<StreamInfo> = ctx
            .streams()
            .map(|s| StreamInfo {
                index: s.index(),
                is_video: s.parameters().medium() == ffmpeg::media::Type::Video,
                is_audio: s.parameters().medium() == ffmpeg::media::Type::Audio,
                codec_id: format!("{:?}", s.parameters().id()),
                time_base: to_rational(s.time_base()),
            })
            .collect();
        if streams.is_empty() {
            return Err(MediaError::NoStreams { url: url.to_string() });
        }
        Ok(FfmpegInput { ctx, streams })
    }

    fn open_output(
        &self,
        format: &str,
        url: &str,
        input: &Self::Input,
        options: &HashMap<String, String>,
    ) -> Result<Self::Output, MediaError> {
        let mut octx = ffmpeg::format::output_as(&url, format).map_err(|e| MediaError::OutputOpen {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mapping = build_stream_mapping(&input.streams);
        for stream in input.ctx.streams() {
            if mapping.get(stream.index()).is_none() {
                continue;
            }
            let mut ost = octx
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
                .map_err(|e| MediaError::OutputOpen { url: url.to_string(), reason: e.to_string() })?;
            ost.set_parameters(stream.parameters());
        }

        let mut dict = ffmpeg::Dictionary::new();
        for (k, v) in options {
            dict.set(k, v);
        }
        octx.write_header_with(dict)
            .map_err(|e| MediaError::OutputOpen { url: url.to_string(), reason: e.to_string() })?;

        Ok(FfmpegOutput { ctx: octx, mapping })
    }

    fn new_decoder(&self, input: &Self::Input, stream_index: usize) -> Result<Self::Decoder, MediaError> {
        let stream = input
            .ctx
            .stream(stream_index)
            .ok_or_else(|| MediaError::Other(format!("no such stream {stream_index}")))?;
        let context = ffmpeg::codec::Context::from_parameters(stream.parameters())
            .map_err(|e| MediaError::DecoderFailed { reason: e.to_string() })?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| MediaError::DecoderFailed { reason: e.to_string() })?;
        if negotiate_pixel_format(&[decoder.format()]).is_none() {
            debug!(
                "stream {stream_index} decodes to {:?}, which is not 4:2:0; comparisons against it will fail",
                decoder.format()
            );
        }
        Ok(FfmpegDecoder { decoder })
    }
}
