use super::*;

use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

use crate::config::EndOfStream;
use crate::state::{connection_state_channel, ConnectionStateTx};
use crate::{FRAME_BYTES, SAMPLES_PER_FRAME};

/// build_pcm returns `frames` frames where every sample of frame `i` is `i`,
/// followed by `extra` zero bytes
fn build_pcm(frames: usize, extra: usize) -> Vec<u8> {
    let mut raw: Vec<u8> = (0..frames * SAMPLES_PER_FRAME)
        .flat_map(|i| ((i / SAMPLES_PER_FRAME) as f32).to_le_bytes())
        .collect();
    raw.resize(frames * FRAME_BYTES + extra, 0);
    raw
}

/// FrameIndexEncoder encodes a frame as the single byte of its first sample
struct FrameIndexEncoder;

impl FrameEncoder for FrameIndexEncoder {
    fn encode(&mut self, pcm: &[f32]) -> Result<Bytes> {
        Ok(Bytes::from(vec![pcm[0] as u8]))
    }
}

struct FailingEncoder;

impl FrameEncoder for FailingEncoder {
    fn encode(&mut self, pcm: &[f32]) -> Result<Bytes> {
        Err(Error::ErrInvalidFrameLength {
            expected: 0,
            actual: pcm.len(),
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    writes: Mutex<Vec<(Instant, Bytes, Duration)>>,
    fail_at: Option<usize>,
}

impl RecordingSink {
    fn count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    fn payloads(&self) -> Vec<u8> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, data, _)| data[0])
            .collect()
    }

    fn times(&self) -> Vec<Instant> {
        self.writes.lock().unwrap().iter().map(|(t, _, _)| *t).collect()
    }
}

#[async_trait]
impl SampleSink for RecordingSink {
    async fn write_sample(&self, sample: &Sample) -> Result<()> {
        let mut writes = self.writes.lock().unwrap();
        if self.fail_at == Some(writes.len()) {
            return Err(webrtc::Error::ErrConnectionClosed.into());
        }
        writes.push((Instant::now(), sample.data.clone(), sample.duration));
        Ok(())
    }
}

fn new_pacer(
    raw: Vec<u8>,
    end_of_stream: EndOfStream,
    sink: &Arc<RecordingSink>,
) -> (AudioPacer<Cursor<Vec<u8>>>, ConnectionStateTx) {
    let (state_tx, state_rx) = connection_state_channel();
    let pacer = AudioPacer::new(
        PcmReader::new(Cursor::new(raw), end_of_stream),
        Box::new(FrameIndexEncoder),
        Arc::clone(sink) as Arc<dyn SampleSink + Send + Sync>,
        state_rx,
    );
    (pacer, state_tx)
}

#[tokio::test(start_paused = true)]
async fn test_pacer_gated_until_connected() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(3, 0), EndOfStream::Stop, &sink);

    let handle = tokio::spawn(pacer.run());

    // frames are available right away, but nothing goes out yet
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(sink.count(), 0);
    assert!(!handle.is_finished());

    state_tx.publish(RTCPeerConnectionState::Connecting.into());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.count(), 0);

    let connected_at = Instant::now();
    state_tx.publish(ConnectionState::Connected);
    let stats = handle.await??;

    assert_eq!(stats.frames_sent, 3);
    assert_eq!(sink.payloads(), vec![0, 1, 2]);
    for t in sink.times() {
        assert!(t >= connected_at + FRAME_DURATION);
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pacer_sends_one_frame_per_period() -> Result<()> {
    let n = 10;
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(n, 0), EndOfStream::Stop, &sink);
    state_tx.publish(ConnectionState::Connected);

    let start = Instant::now();
    let stats = pacer.run().await?;
    let elapsed = start.elapsed();

    assert_eq!(stats.frames_sent, n as u64);
    assert_eq!(stats.bytes_sent, n as u64);
    assert_eq!(stats.short_reads, 0);
    assert!(
        elapsed >= FRAME_DURATION * n as u32,
        "{n} frames took {elapsed:?}"
    );

    let times = sink.times();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= FRAME_DURATION);
    }
    for (_, _, duration) in sink.writes.lock().unwrap().iter() {
        assert_eq!(*duration, FRAME_DURATION);
    }
    assert_eq!(sink.payloads(), (0..n as u8).collect::<Vec<u8>>());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pacer_short_final_read() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(2, 100), EndOfStream::Stop, &sink);
    state_tx.publish(ConnectionState::Connected);

    let stats = pacer.run().await?;

    assert_eq!(stats.frames_sent, 3);
    assert_eq!(stats.short_reads, 1);
    // the partial frame only holds zero bytes, its padding is silence too
    assert_eq!(sink.payloads(), vec![0, 1, 0]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pacer_pauses_while_disconnected() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(20, 0), EndOfStream::Stop, &sink);
    state_tx.publish(ConnectionState::Connected);

    let handle = tokio::spawn(pacer.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    state_tx.publish(ConnectionState::Disconnected);
    let sent_at_disconnect = sink.count();
    assert!(sent_at_disconnect >= 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    // a frame already waiting for its tick may still go out
    let sent_while_down = sink.count();
    assert!(sent_while_down <= sent_at_disconnect + 1);
    assert!(!handle.is_finished());

    let reconnected_at = Instant::now();
    state_tx.publish(ConnectionState::Connected);
    let stats = handle.await??;

    assert_eq!(stats.frames_sent, 20);
    assert_eq!(stats.pauses, 1);
    assert_eq!(sink.payloads(), (0..20).collect::<Vec<u8>>());

    let resumed = &sink.times()[sent_while_down..];
    assert!(resumed.iter().all(|t| *t >= reconnected_at + FRAME_DURATION));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pacer_stops_on_failure() {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(100, 0), EndOfStream::Stop, &sink);
    state_tx.publish(ConnectionState::Connected);

    let handle = tokio::spawn(pacer.run());

    tokio::time::sleep(Duration::from_millis(70)).await;
    state_tx.publish(ConnectionState::Failed);

    let result = handle.await.expect("join");
    assert!(matches!(result, Err(Error::ErrConnectionFailed)), "{result:?}");
    assert!(sink.count() < 100);
}

#[tokio::test(start_paused = true)]
async fn test_pacer_fails_before_connecting() {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(3, 0), EndOfStream::Stop, &sink);
    state_tx.publish(ConnectionState::Failed);

    let result = pacer.run().await;
    assert!(matches!(result, Err(Error::ErrConnectionFailed)), "{result:?}");
    assert_eq!(sink.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pacer_write_failure_is_fatal() {
    let sink = Arc::new(RecordingSink {
        fail_at: Some(2),
        ..Default::default()
    });
    let (pacer, state_tx) = new_pacer(build_pcm(5, 0), EndOfStream::Stop, &sink);
    state_tx.publish(ConnectionState::Connected);

    let result = pacer.run().await;
    assert!(
        matches!(
            result,
            Err(Error::WebRTC(webrtc::Error::ErrConnectionClosed))
        ),
        "{result:?}"
    );
    assert_eq!(sink.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pacer_encode_failure_is_fatal() {
    let sink = Arc::new(RecordingSink::default());
    let (state_tx, state_rx) = connection_state_channel();
    let pacer = AudioPacer::new(
        PcmReader::new(Cursor::new(build_pcm(3, 0)), EndOfStream::Stop),
        Box::new(FailingEncoder),
        Arc::clone(&sink) as Arc<dyn SampleSink + Send + Sync>,
        state_rx,
    );
    state_tx.publish(ConnectionState::Connected);

    let result = pacer.run().await;
    assert!(
        matches!(result, Err(Error::ErrInvalidFrameLength { .. })),
        "{result:?}"
    );
    assert_eq!(sink.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pacer_loops_audio_file() {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(2, 0), EndOfStream::Loop, &sink);
    state_tx.publish(ConnectionState::Connected);

    let handle = tokio::spawn(pacer.run());

    tokio::time::sleep(Duration::from_millis(110)).await;
    state_tx.publish(ConnectionState::Failed);
    let result = handle.await.expect("join");
    assert!(matches!(result, Err(Error::ErrConnectionFailed)));

    let payloads = sink.payloads();
    assert!(payloads.len() >= 5, "{payloads:?}");
    for (i, p) in payloads.iter().enumerate() {
        assert_eq!(*p as usize, i % 2);
    }
}

#[tokio::test(start_paused = true)]
async fn test_pacer_done_returns_stats() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, state_tx) = new_pacer(build_pcm(2, 0), EndOfStream::Loop, &sink);
    let (done_tx, done_rx) = mpsc::channel(1);
    let pacer = pacer.with_done(done_rx);
    state_tx.publish(ConnectionState::Connected);

    let handle = tokio::spawn(pacer.run());

    tokio::time::sleep(Duration::from_millis(110)).await;
    let _ = done_tx.send(()).await;
    let stats = handle.await??;

    assert_eq!(stats.frames_sent, sink.count() as u64);
    assert!(stats.frames_sent >= 5, "{stats}");
    assert!(stats.rewinds >= 2, "{stats}");
    assert_eq!(stats.short_reads, 0);

    // nothing goes out once it has stopped
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.count() as u64, stats.frames_sent);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pacer_done_before_connecting() -> Result<()> {
    let sink = Arc::new(RecordingSink::default());
    let (pacer, _state_tx) = new_pacer(build_pcm(3, 0), EndOfStream::Stop, &sink);
    let (done_tx, done_rx) = mpsc::channel(1);
    let pacer = pacer.with_done(done_rx);

    let handle = tokio::spawn(pacer.run());
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(done_tx);

    let stats = handle.await??;
    assert_eq!(stats, PacerStats::default());
    assert_eq!(sink.count(), 0);

    Ok(())
}
