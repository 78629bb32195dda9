//! camwatch: multi-camera video recorder and motion-triggered archiver.
//!
//! Copyright (C) 2026  camwatch contributors
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.
//!
//! Wires the CLI surface to configuration loading and the camera
//! supervisor, and installs logging and signal handling.

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde_derive;

mod cli;
mod comparator;
mod config;
mod live;
mod media;
mod motion;
mod packet_queue;
mod recorder;
mod strftime;
mod supervisor;
mod worker;

use anyhow::{Context, Result};
use cfg_if::cfg_if;
use env_logger::Builder;

cfg_if! {
    if #[cfg(feature = "ffmpeg")] {
        use media::ffmpeg::FfmpegMedia;
    } else {
        use media::mock::MockMedia;
    }
}

fn main() -> Result<()> {
    let version = format!("{}, version: {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let args = cli::parse(&version);

    Builder::new().filter_level(cli::verbosity_to_level(args.flag_v)).init();

    let cameras = config::load(std::path::Path::new(&args.flag_c))
        .with_context(|| format!("failed to load configuration from {}", args.flag_c))?;

    if args.flag_t {
        info!("configuration valid, {} camera(s) parsed", cameras.len());
        return Ok(());
    }

    info!("starting {} camera worker(s)", cameras.len());

    let mut sup = supervisor::CameraSupervisor::new();
    sup.install_signal_handlers().context("failed to install signal handlers")?;

    cfg_if! {
        if #[cfg(feature = "ffmpeg")] {
            media::ffmpeg::init().context("failed to initialize media backend")?;
            sup.start(cameras, FfmpegMedia::new);
        } else {
            warn!("built without the ffmpeg backend; running against the in-memory media double");
            sup.start(cameras, MockMedia::new);
        }
    }

    sup.join_all();
    info!("shutdown complete");
    Ok(())
}
