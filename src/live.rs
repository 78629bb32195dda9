//! Owns the live output: opens lazily on first packet, continuously muxes
//! every packet, never closes until shutdown.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Grounded in `original_source/src/zcamera.c`'s `processPacket`, the half
//! of it that drives the live mirror: best effort, no reopen after a
//! failed open.

use std::collections::HashMap;

use crate::media::{MediaIo, Packet, Rational};

pub struct LiveOutputConfig {
    pub format: String,
    pub url: String,
    pub options: HashMap<String, String>,
}

enum State<O> {
    NotOpened,
    Open(O),
    /// A prior open attempt failed; never retried.
    PermanentlyFailed,
}

pub struct LiveMirror<M: MediaIo> {
    state: State<M::Output>,
}

impl<M: MediaIo> LiveMirror<M> {
    pub fn new() -> Self {
        Self { state: State::NotOpened }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Forwards `packet`. Opens the live output lazily on the first call.
    /// Open/write errors are logged, never propagated.
    pub fn on_packet(
        &mut self,
        media: &M,
        input: &M::Input,
        config: &LiveOutputConfig,
        input_time_base: Rational,
        packet: &Packet,
    ) {
        if let State::NotOpened = self.state {
            let url = crate::strftime::expand(&config.url);
            match media.open_output(&config.format, &url, input, &config.options) {
                Ok(output) => self.state = State::Open(output),
                Err(e) => {
                    warn!("failed to open live output {url}: {e}");
                    self.state = State::PermanentlyFailed;
                    return;
                }
            }
        }

        if let State::Open(output) = &mut self.state {
            if let Err(e) = output.write_packet(input_time_base, packet) {
                warn!("failed to write live packet: {e}");
            }
        }
    }

    /// Closes the live output, if open. Called on worker shutdown.
    pub fn close(&mut self) {
        if let State::Open(_) = self.state {
            let prior = std::mem::replace(&mut self.state, State::PermanentlyFailed);
            if let State::Open(output) = prior {
                if let Err(e) = output.close() {
                    warn!("failed to close live output: {e}");
                }
            }
        }
    }
}

impl<M: MediaIo> Default for LiveMirror<M> {
    fn default() -> Self {
        Self::new()
    }
}
