//! Owns the motion output lifecycle: opens on first Detected, writes
//! pre-roll + ongoing packets, closes on NotDetected.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Grounded in `original_source/src/zcamera.c`'s `processPacket`, the half
//! of it that drives motion recording; the one-element queue round-trip for
//! non-keyframes while recording keeps the ownership/refcount discipline
//! uniform with the Detected path (see spec rationale for this component).

use std::collections::HashMap;

use crate::media::{MediaError, MediaIo, Packet, Rational};
use crate::motion::Classification;
use crate::packet_queue::PacketQueue;

/// Where a motion segment's output should land: format, URL (already
/// strftime-expanded), and muxer options.
pub struct MotionOutputConfig {
    pub format: String,
    pub url: String,
    pub options: HashMap<String, String>,
}

enum OutputState<O> {
    Closed,
    Open(O),
}

/// Drives the motion output open/close lifecycle from a stream of
/// `(packet, classification)` events.
pub struct SegmentRecorder<M: MediaIo> {
    output: OutputState<M::Output>,
    active: bool,
    queue: PacketQueue,
}

impl<M: MediaIo> SegmentRecorder<M> {
    pub fn new() -> Self {
        Self { output: OutputState::Closed, active: false, queue: PacketQueue::new() }
    }

    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self { output: OutputState::Closed, active: false, queue: PacketQueue::with_capacity(capacity) }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Processes one `(packet, classification)` event against the state
    /// machine described in the component's pseudocode contract.
    pub fn on_event(
        &mut self,
        media: &M,
        input: &M::Input,
        config: &MotionOutputConfig,
        input_time_base: Rational,
        packet: &Packet,
        classification: Classification,
    ) {
        if classification == Classification::NotDetected {
            self.close_if_open();
            self.queue.drain();
        }

        if let Err(_rejected) = self.queue.put(packet.clone()) {
            if self.active {
                warn!("packet queue full during active motion segment, dropping packet");
            } else {
                warn!("packet queue full, dropping packet");
            }
        }

        match classification {
            Classification::NotDetected => {}
            Classification::Detected => {
                if matches!(self.output, OutputState::Closed) {
                    self.open(media, input, config);
                }
                while let Some(pkt) = self.queue.get() {
                    self.write(input_time_base, &pkt);
                }
            }
            Classification::NonKeyframe => {
                if matches!(self.output, OutputState::Open(_)) {
                    if let Some(pkt) = self.queue.get() {
                        self.write(input_time_base, &pkt);
                    }
                }
            }
        }
    }

    fn open(&mut self, media: &M, input: &M::Input, config: &MotionOutputConfig) {
        let url = crate::strftime::expand(&config.url);
        match media.open_output(&config.format, &url, input, &config.options) {
            Ok(output) => {
                self.output = OutputState::Open(output);
                self.active = true;
            }
            Err(e) => {
                warn!("failed to open motion output {url}: {e}");
            }
        }
    }

    fn write(&mut self, input_time_base: Rational, packet: &Packet) {
        if let OutputState::Open(output) = &mut self.output {
            if let Err(e) = output.write_packet(input_time_base, packet) {
                warn!("failed to write motion packet: {e}");
            }
        }
    }

    fn close_if_open(&mut self) {
        if let OutputState::Open(_) = self.output {
            let prior = std::mem::replace(&mut self.output, OutputState::Closed);
            if let OutputState::Open(output) = prior {
                if let Err(e) = output.close() {
                    warn!("failed to close motion output: {e}");
                }
            }
            self.active = false;
        }
    }

    /// Releases all queued packets and closes the output, if open. Called
    /// on worker shutdown.
    pub fn shutdown(&mut self) {
        self.close_if_open();
        self.queue.drain();
    }
}

impl<M: MediaIo> Default for SegmentRecorder<M> {
    fn default() -> Self {
        Self::new()
    }
}

pub type RecorderError = MediaError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::mock::{video_delta, video_keyframe, MockMedia};

    fn config() -> MotionOutputConfig {
        MotionOutputConfig { format: "mp4".into(), url: "motion.mp4".into(), options: HashMap::new() }
    }

    fn tb() -> Rational {
        Rational::new(1, 90000)
    }

    #[test]
    fn output_open_iff_detected_since_last_not_detected() {
        let media = MockMedia::new();
        let input = media.open_input("mock://").unwrap();
        let cfg = config();
        let mut rec: SegmentRecorder<MockMedia> = SegmentRecorder::new();

        assert!(!rec.is_active());
        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 0, vec![1]), Classification::Detected);
        assert!(rec.is_active());
        rec.on_event(&media, &input, &cfg, tb(), &video_delta(0, 1, vec![2]), Classification::NonKeyframe);
        assert!(rec.is_active());
        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 2, vec![3]), Classification::NotDetected);
        assert!(!rec.is_active());
    }

    #[test]
    fn s1_quiet_motion_quiet_opens_once_and_carries_interleaved_nonkeyframes() {
        let media = MockMedia::new();
        let input = media.open_input("mock://").unwrap();
        let cfg = config();
        let mut rec: SegmentRecorder<MockMedia> = SegmentRecorder::new();

        for i in 0..10 {
            rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, i, vec![i as u8]), Classification::NotDetected);
        }
        assert_eq!(media.open_output_count(), 0);

        for i in 10..15 {
            let classification = if i == 10 { Classification::Detected } else { Classification::NonKeyframe };
            rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, i, vec![i as u8]), classification);
            rec.on_event(&media, &input, &cfg, tb(), &video_delta(0, i * 10, vec![i as u8, 1]), Classification::NonKeyframe);
        }
        assert_eq!(media.open_output_count(), 1);

        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 15, vec![15]), Classification::NotDetected);
        assert!(!rec.is_active());

        let segments = media.closed_segments();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].len() >= 5);
    }

    #[test]
    fn s2_pre_roll_correctness_first_motion_packet_is_triggering_keyframe() {
        let media = MockMedia::new();
        let input = media.open_input("mock://").unwrap();
        let cfg = config();
        let mut rec: SegmentRecorder<MockMedia> = SegmentRecorder::new();

        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 0, vec![0]), Classification::NotDetected);
        for i in 1..=5 {
            rec.on_event(&media, &input, &cfg, tb(), &video_delta(0, i, vec![i as u8]), Classification::NonKeyframe);
        }
        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 6, vec![6]), Classification::Detected);
        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 7, vec![7]), Classification::NotDetected);

        let segments = media.closed_segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 1);
        assert_eq!(segments[0][0].pts, 6);
    }

    #[test]
    fn s3_queue_overflow_under_sustained_nonkeyframe_burst_stays_closed() {
        let media = MockMedia::new();
        let input = media.open_input("mock://").unwrap();
        let cfg = config();
        let mut rec: SegmentRecorder<MockMedia> = SegmentRecorder::with_queue_capacity(8);

        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 0, vec![0]), Classification::NotDetected);
        for i in 1..=20 {
            rec.on_event(&media, &input, &cfg, tb(), &video_delta(0, i, vec![i as u8]), Classification::NonKeyframe);
        }

        assert!(!rec.is_active());
        assert_eq!(media.open_output_count(), 0);
    }

    #[test]
    fn every_put_is_eventually_written_or_released_by_shutdown() {
        let media = MockMedia::new();
        let input = media.open_input("mock://").unwrap();
        let cfg = config();
        let mut rec: SegmentRecorder<MockMedia> = SegmentRecorder::new();

        rec.on_event(&media, &input, &cfg, tb(), &video_keyframe(0, 0, vec![0]), Classification::Detected);
        rec.on_event(&media, &input, &cfg, tb(), &video_delta(0, 1, vec![1]), Classification::NonKeyframe);
        rec.shutdown();

        let segments = media.closed_segments();
        assert_eq!(segments.len(), 1);
    }
}
