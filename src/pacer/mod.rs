#[cfg(test)]
mod pacer_test;

use std::fmt;
use std::io::{Read, Seek};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use webrtc::media::Sample;

use crate::encoder::FrameEncoder;
use crate::error::{Error, Result};
use crate::pcm::PcmReader;
use crate::sink::SampleSink;
use crate::state::{ConnectionState, ConnectionStateRx};
use crate::FRAME_DURATION;

/// PacerStats summarizes a finished audio stream
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacerStats {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub short_reads: u64,
    pub rewinds: u64,
    /// pauses counts how often a disconnect halted sending mid-stream
    pub pauses: u64,
}

impl fmt::Display for PacerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames ({} bytes) sent, {} short reads, {} rewinds, {} pauses",
            self.frames_sent, self.bytes_sent, self.short_reads, self.rewinds, self.pauses
        )
    }
}

/// AudioPacer pushes one encoded frame to its sink every frame period while
/// the connection is up. It owns the reader and the encoder.
pub struct AudioPacer<R: Read + Seek> {
    reader: PcmReader<R>,
    encoder: Box<dyn FrameEncoder + Send>,
    sink: Arc<dyn SampleSink + Send + Sync>,
    state: ConnectionStateRx,
    done_rx: Option<mpsc::Receiver<()>>,
    frame_duration: Duration,
}

impl<R: Read + Seek> AudioPacer<R> {
    pub fn new(
        reader: PcmReader<R>,
        encoder: Box<dyn FrameEncoder + Send>,
        sink: Arc<dyn SampleSink + Send + Sync>,
        state: ConnectionStateRx,
    ) -> Self {
        AudioPacer {
            reader,
            encoder,
            sink,
            state,
            done_rx: None,
            frame_duration: FRAME_DURATION,
        }
    }

    /// with_done lets the owner stop the stream early. A message on, or the
    /// close of, `done_rx` ends `run` with the stats gathered so far.
    pub fn with_done(mut self, done_rx: mpsc::Receiver<()>) -> Self {
        self.done_rx = Some(done_rx);
        self
    }

    /// run streams until the reader is exhausted or it is told to stop. It
    /// returns an error if the connection fails or any read, encode or write
    /// fails.
    pub async fn run(mut self) -> Result<PacerStats> {
        let mut stats = PacerStats::default();

        // Wait for connection established
        tokio::select! {
            res = self.state.wait_connected() => res?,
            _ = done(&mut self.done_rx) => {
                log::info!("stopped before the connection was established");
                return Ok(stats);
            }
        }
        log::info!("connected, start sending audio");

        // It is important to use a ticker instead of sleeping because it
        // does not accumulate the time spent reading and encoding.
        let mut ticker = interval(self.frame_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            match self.state.current() {
                ConnectionState::Connected => {}
                ConnectionState::Disconnected => {
                    log::warn!("connection lost, pausing audio");
                    stats.pauses += 1;
                    tokio::select! {
                        res = self.state.wait_connected() => res?,
                        _ = done(&mut self.done_rx) => break,
                    }
                    log::info!("connection restored, resuming audio");
                    ticker.reset();
                }
                ConnectionState::Failed => return Err(Error::ErrConnectionFailed),
            }

            let frame = match self.reader.next_frame()? {
                Some(frame) => frame,
                None => break,
            };

            // Encode ahead of the deadline so the send happens right on the tick
            let data = self.encoder.encode(frame.samples())?;
            let len = data.len();

            tokio::select! {
                _ = ticker.tick() => {}
                _ = done(&mut self.done_rx) => break,
            }

            self.sink
                .write_sample(&Sample {
                    data,
                    duration: self.frame_duration,
                    ..Default::default()
                })
                .await?;

            stats.frames_sent += 1;
            stats.bytes_sent += len as u64;
        }

        stats.short_reads = self.reader.short_reads();
        stats.rewinds = self.reader.rewinds();
        log::info!("audio stream finished: {stats}");

        Ok(stats)
    }
}

/// done resolves once a stop was requested, and never without a receiver
async fn done(done_rx: &mut Option<mpsc::Receiver<()>>) {
    match done_rx {
        Some(rx) => {
            let _ = rx.recv().await;
        }
        None => std::future::pending().await,
    }
}
