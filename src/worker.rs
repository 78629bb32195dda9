//! One worker per camera: supervises input open/read/retry, routes each
//! packet through MotionClassifier + SegmentRecorder + LiveMirror.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Grounded in `original_source/src/zcamera.c`'s `zCameraThreadFunc`/
//! `readPacket` loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use crate::config::CameraConfig;
use crate::live::{LiveMirror, LiveOutputConfig};
use crate::media::{InputHandle, MediaIo};
use crate::motion::MotionClassifier;
use crate::recorder::{MotionOutputConfig, SegmentRecorder};

/// Input open/read is retried after this long on failure.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Drives one camera end to end: owns the classifier, recorder, and live
/// mirror for its camera and supervises the input connection.
pub struct CameraWorker<M: MediaIo> {
    media: M,
    config: CameraConfig,
    shutdown: Arc<AtomicBool>,
    retry_backoff: Duration,
}

impl<M: MediaIo> CameraWorker<M> {
    pub fn new(media: M, config: CameraConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self::with_retry_backoff(media, config, shutdown, RETRY_BACKOFF)
    }

    /// Like `new`, but with an overridable retry backoff (tests use a short
    /// one so input-retry scenarios don't need to wait a full second).
    pub fn with_retry_backoff(media: M, config: CameraConfig, shutdown: Arc<AtomicBool>, retry_backoff: Duration) -> Self {
        Self { media, config, shutdown, retry_backoff }
    }

    /// Runs the camera's main loop until shutdown is requested. Blocking;
    /// intended to be called from its own OS thread.
    pub fn run(&self) {
        let motion_cfg = MotionOutputConfig {
            format: self.config.output_motion.format.clone(),
            url: self.config.output_motion.url.clone(),
            options: self.config.output_motion.options.clone(),
        };
        let live_cfg = LiveOutputConfig {
            format: self.config.output_live.format.clone(),
            url: self.config.output_live.url.clone(),
            options: self.config.output_live.options.clone(),
        };

        let mut recorder: SegmentRecorder<M> = SegmentRecorder::new();
        let mut live: LiveMirror<M> = LiveMirror::new();
        // Persists for the worker's lifetime, across reconnects, like
        // `recorder`/`live` above: only the decoder and the prior keyframe it
        // remembers get reset on a decode failure, never on a mere reconnect.
        let mut classifier: Option<MotionClassifier<M>> = None;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match self.media.open_input(&self.config.input_url) {
                Ok(input) => {
                    let video_stream = input
                        .streams()
                        .iter()
                        .find(|s| s.is_video)
                        .map(|s| s.index)
                        .unwrap_or(0);
                    let input_time_base = input
                        .streams()
                        .iter()
                        .find(|s| s.index == video_stream)
                        .map(|s| s.time_base)
                        .unwrap_or(crate::media::Rational::new(1, 1));

                    match classifier.as_mut() {
                        Some(c) => c.set_stream_index(video_stream),
                        None => {
                            classifier = Some(MotionClassifier::new(
                                video_stream,
                                self.config.detect_threshold,
                                self.config.detect_logfile.as_deref(),
                            ));
                        }
                    }

                    self.read_loop(
                        input,
                        classifier.as_mut().unwrap(),
                        &mut recorder,
                        &mut live,
                        &motion_cfg,
                        &live_cfg,
                        input_time_base,
                    );
                }
                Err(e) => {
                    warn!("failed to open input {}: {e}", self.config.input_url);
                }
            }

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(self.retry_backoff);
        }

        recorder.shutdown();
        live.close();
    }

    #[allow(clippy::too_many_arguments)]
    fn read_loop(
        &self,
        mut input: M::Input,
        classifier: &mut MotionClassifier<M>,
        recorder: &mut SegmentRecorder<M>,
        live: &mut LiveMirror<M>,
        motion_cfg: &MotionOutputConfig,
        live_cfg: &LiveOutputConfig,
        input_time_base: crate::media::Rational,
    ) {
        while !self.shutdown.load(Ordering::Relaxed) {
            let packet = match input.read_packet() {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("input read failed for {}: {e}", self.config.name);
                    break;
                }
            };

            let classification = classifier.feed(&self.media, &input, &packet);
            recorder.on_event(&self.media, &input, motion_cfg, input_time_base, &packet, classification);
            live.on_packet(&self.media, &input, live_cfg, input_time_base, &packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use crate::media::mock::MockMedia;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    fn cam_config() -> CameraConfig {
        CameraConfig {
            name: "front-door".into(),
            input_url: "mock://front-door".into(),
            output_live: OutputConfig { format: "hls".into(), url: "live.m3u8".into(), options: HashMap::new() },
            output_motion: OutputConfig { format: "mp4".into(), url: "motion.mp4".into(), options: HashMap::new() },
            detect_threshold: 10.0,
            detect_thumbnail: None,
            detect_logfile: None,
        }
    }

    #[test]
    fn s5_shutdown_requested_before_run_exits_immediately() {
        let media = MockMedia::new();
        let shutdown = Arc::new(AtomicBool::new(true));
        let worker = CameraWorker::new(media.clone(), cam_config(), shutdown);
        worker.run();
        assert_eq!(media.open_output_count(), 0);
    }

    #[test]
    fn s4_worker_retries_input_open_with_empty_stream_until_shutdown() {
        let media = MockMedia::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let worker = CameraWorker::new(media, cam_config(), shutdown.clone());

        let handle = std::thread::spawn(move || worker.run());
        std::thread::sleep(Duration::from_millis(50));
        shutdown_clone.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn s5_graceful_shutdown_mid_read_drains_queue_and_closes_both_outputs() {
        use crate::media::{Rational, StreamInfo};
        use crate::media::mock::{solid_frame, video_delta, video_keyframe};

        let media = MockMedia::new();
        media.script_frame(&[1], solid_frame(4, 4, 0, 0, 0));
        media.script_frame(&[2], solid_frame(4, 4, 255, 0, 0));

        let streams = vec![StreamInfo {
            index: 0,
            is_video: true,
            is_audio: false,
            codec_id: "h264".into(),
            time_base: Rational::new(1, 90000),
        }];
        let mut packets = vec![video_keyframe(0, 0, vec![1]), video_keyframe(0, 1, vec![2])];
        packets.extend((2..200).map(|i| video_delta(0, i, vec![i as u8])));
        media.script_input_packets(streams, packets);
        media.set_input_read_delay(Duration::from_millis(5));

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let worker = CameraWorker::new(media.clone(), cam_config(), shutdown.clone());

        let handle = std::thread::spawn(move || worker.run());
        // Let a few packets flow, including the motion-triggering second
        // keyframe, then request shutdown mid-stream.
        std::thread::sleep(Duration::from_millis(30));
        shutdown_clone.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        // The motion segment opened by the second keyframe must have been
        // closed on the shutdown path, not left dangling.
        assert_eq!(media.open_output_count(), 2, "expected one live and one motion output opened");
        let segments = media.closed_segments();
        assert_eq!(segments.len(), 2, "both live and motion outputs must be closed on shutdown");
    }

    #[test]
    fn motion_classifier_state_survives_a_reconnect() {
        use crate::media::{Rational, StreamInfo};
        use crate::media::mock::{solid_frame, video_keyframe};

        let media = MockMedia::new();
        // Every connection reads the same single identical keyframe, then
        // hits EndOfStream and reconnects. If the classifier's decoder/
        // prev_frame were reset on each reconnect, every connection's first
        // keyframe would see no prior frame and fail toward Detected; if
        // state survives, only the very first keyframe ever seen does.
        media.script_frame(&[1], solid_frame(4, 4, 0, 0, 0));
        let streams = vec![StreamInfo {
            index: 0,
            is_video: true,
            is_audio: false,
            codec_id: "h264".into(),
            time_base: Rational::new(1, 90000),
        }];
        media.script_input_packets(streams, vec![video_keyframe(0, 0, vec![1])]);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let worker = CameraWorker::with_retry_backoff(
            media.clone(),
            cam_config(),
            shutdown.clone(),
            Duration::from_millis(10),
        );

        let handle = std::thread::spawn(move || worker.run());
        // Give it time for several reconnects against the same one-packet
        // stream.
        std::thread::sleep(Duration::from_millis(150));
        shutdown_clone.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(
            media.new_decoder_call_count(),
            1,
            "decoder (and the classifier owning it) must not be rebuilt on reconnect"
        );
    }

    #[test]
    fn s4_input_retry_opens_on_third_attempt_after_two_scripted_failures() {
        let media = MockMedia::new();
        media.script_input_open_failures(2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let worker = CameraWorker::with_retry_backoff(
            media.clone(),
            cam_config(),
            shutdown.clone(),
            Duration::from_millis(10),
        );

        let handle = std::thread::spawn(move || worker.run());
        // Each scripted failure is followed by the retry backoff before the
        // next open attempt; give it enough margin to reach the third.
        std::thread::sleep(Duration::from_millis(200));
        shutdown_clone.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(
            media.open_input_attempts() >= 3,
            "expected at least 3 open_input attempts (2 failures + 1 success), got {}",
            media.open_input_attempts()
        );
    }
}
