//! Decodes keyframe packets, compares against the previous keyframe, and
//! emits a {NonKeyframe, Detected, NotDetected} classification.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Grounded in `original_source/src/zcamera.c`'s `processPacket`, the half
//! of it that lazily creates the decoder, decodes keyframes, and treats
//! comparator failure as motion.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use crate::comparator::KeyframeComparator;
use crate::media::{DecoderHandle, Frame, MediaError, MediaIo, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NonKeyframe,
    Detected,
    NotDetected,
}

/// Decodes keyframes and classifies motion. Owns a lazily-created decoder
/// and the previously decoded keyframe.
pub struct MotionClassifier<M: MediaIo> {
    stream_index: usize,
    threshold: f64,
    decoder: Option<M::Decoder>,
    prev_frame: Option<Frame>,
    comparator: KeyframeComparator,
    log_file: Option<File>,
}

impl<M: MediaIo> MotionClassifier<M> {
    pub fn new(stream_index: usize, threshold: f64, log_path: Option<&Path>) -> Self {
        let log_file = log_path.and_then(|p| match OpenOptions::new().create(true).append(true).open(p) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!("failed to open detect logfile {}: {e}", p.display());
                None
            }
        });
        Self {
            stream_index,
            threshold,
            decoder: None,
            prev_frame: None,
            comparator: KeyframeComparator::new(),
            log_file,
        }
    }

    /// Classifies one packet, decoding it and updating internal state if it
    /// is a video keyframe on the tracked stream.
    pub fn feed(&mut self, media: &M, input: &M::Input, packet: &Packet) -> Classification {
        if !packet.is_video || !packet.is_keyframe {
            return Classification::NonKeyframe;
        }

        if self.decoder.is_none() {
            match media.new_decoder(input, self.stream_index) {
                Ok(d) => self.decoder = Some(d),
                Err(e) => {
                    warn!("failed to create decoder: {e}");
                    return Classification::Detected;
                }
            }
        }

        let frames = match self.decoder.as_mut().unwrap().decode_keyframe(packet) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("decoder failure, invalidating decoder: {e}");
                self.decoder = None;
                return Classification::Detected;
            }
        };

        let mut decision = Classification::NotDetected;
        for frame in frames {
            decision = match self.comparator.compare(self.prev_frame.as_ref(), &frame) {
                Ok(delta) => {
                    let decision = if delta.aggregate() > self.threshold {
                        Classification::Detected
                    } else {
                        Classification::NotDetected
                    };
                    self.log_delta(delta.y, delta.u, delta.v, delta.aggregate(), decision);
                    decision
                }
                Err(e) => {
                    debug!("comparator error, treating as Detected: {e}");
                    Classification::Detected
                }
            };
            self.prev_frame = Some(frame);
        }
        decision
    }

    fn log_delta(&mut self, y: f64, u: f64, v: f64, aggregate: f64, decision: Classification) {
        if let Some(f) = self.log_file.as_mut() {
            let decision = match decision {
                Classification::Detected => "Detected",
                Classification::NotDetected => "NotDetected",
                Classification::NonKeyframe => "NonKeyframe",
            };
            if let Err(e) = writeln!(f, "{y} {u} {v} {aggregate} {decision}") {
                warn!("failed to write detect logfile: {e}");
            } else {
                let _ = f.flush();
            }
        }
    }

    /// Drops the decoder; used when a worker wants to force a decoder reset.
    pub fn invalidate_decoder(&mut self) {
        self.decoder = None;
    }

    /// Updates the tracked video stream index, e.g. after a reconnect re-reads
    /// stream info. Leaves `decoder`/`prev_frame` untouched: the classifier's
    /// memory of the prior keyframe persists across reconnects, per the
    /// worker's `CameraState`.
    pub fn set_stream_index(&mut self, stream_index: usize) {
        self.stream_index = stream_index;
    }
}

// Keep MediaError reachable for callers matching on decoder-creation failures
// without importing media::MediaError directly.
pub type DecoderError = MediaError;
