
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::config::Config;
use crate::encoder::OpusFrameEncoder;
use crate::error::{Error, Result};
use crate::pacer::{AudioPacer, PacerStats};
use crate::pcm::PcmReader;
use crate::signal;
use crate::sink::SampleSink;
use crate::state::{connection_state_channel, ConnectionStateTx};

/// run streams `config.audio_file` to the peer whose offer is read from
/// stdin (or `config.input_sdp_file`). It returns once the file has been
/// played, the connection fails, or ctrl-c is pressed.
pub async fn run(config: Config) -> Result<PacerStats> {
    // Assert that we have an audio file
    if !config.audio_file.exists() {
        return Err(Error::ErrAudioFileNotFound(
            config.audio_file.display().to_string(),
        ));
    }
    let file = File::open(&config.audio_file)?;
    let reader = PcmReader::new(BufReader::new(file), config.end_of_stream);
    let encoder = OpusFrameEncoder::new(config.bitrate)?;

    let peer_connection = new_peer_connection(&config).await?;

    let audio_track = new_audio_track();
    let rtp_sender = peer_connection
        .add_track(Arc::clone(&audio_track) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;
    spawn_rtcp_reader(rtp_sender);

    let (state_tx, state_rx) = connection_state_channel();
    watch_connection_state(&peer_connection, state_tx);

    let (done_tx, done_rx) = mpsc::channel::<()>(1);
    let pacer = AudioPacer::new(
        reader,
        Box::new(encoder),
        audio_track as Arc<dyn SampleSink + Send + Sync>,
        state_rx,
    )
    .with_done(done_rx);
    let mut pacer_handle = tokio::spawn(pacer.run());

    let result = exchange_and_wait(&peer_connection, &config, &mut pacer_handle, done_tx).await;

    pacer_handle.abort();
    if let Err(err) = peer_connection.close().await {
        log::error!("Failed to close PeerConnection: {err}");
    }

    result
}

/// exchange_and_wait performs the one-shot signaling exchange, then waits
/// for the pacer to finish or for ctrl-c, which stops the pacer
async fn exchange_and_wait(
    peer_connection: &RTCPeerConnection,
    config: &Config,
    pacer_handle: &mut JoinHandle<Result<PacerStats>>,
    done_tx: mpsc::Sender<()>,
) -> Result<PacerStats> {
    // Wait for the offer to be pasted
    let line = match &config.input_sdp_file {
        Some(path) => signal::read_signal_file(path)?,
        None => signal::must_read_stdin()?,
    };
    let offer = signal::decode(&line)?;
    log::info!("{} received", offer.sdp_type);

    let local_desc = answer(peer_connection, offer).await?;

    // Output the answer in base64 so we can paste it in browser
    println!("{}", signal::encode(&local_desc)?);

    println!("Press ctrl-c to stop");
    tokio::select! {
        res = &mut *pacer_handle => return res?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            log::info!("received ctrl-c signal");
        }
    }

    let _ = done_tx.send(()).await;
    pacer_handle.await?
}

async fn new_peer_connection(config: &Config) -> Result<Arc<RTCPeerConnection>> {
    // Create a MediaEngine object to configure the supported codec
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;

    // Create a InterceptorRegistry. This is the user configurable RTP/RTCP Pipeline.
    // This provides NACKs, RTCP Reports and other features.
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut m)?;

    let api = APIBuilder::new()
        .with_media_engine(m)
        .with_interceptor_registry(registry)
        .build();

    // Prepare the configuration
    let mut rtc_config = RTCConfiguration::default();
    if !config.ice_servers.is_empty() {
        rtc_config.ice_servers = vec![RTCIceServer {
            urls: config.ice_servers.clone(),
            ..Default::default()
        }];
    }

    Ok(Arc::new(api.new_peer_connection(rtc_config).await?))
}

/// new_audio_track creates the outbound Opus track
fn new_audio_track() -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            ..Default::default()
        },
        "audio".to_owned(),
        "webrtc-rs".to_owned(),
    ))
}

/// spawn_rtcp_reader drains incoming RTCP packets. Before these packets are
/// returned they are processed by interceptors, for things like NACK this
/// needs to be called.
fn spawn_rtcp_reader(rtp_sender: Arc<RTCRtpSender>) {
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; 1500];
        while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
        log::trace!("rtcp reader exited");
    });
}

/// watch_connection_state forwards peer connection state changes to the
/// pacing loop
fn watch_connection_state(peer_connection: &RTCPeerConnection, state_tx: ConnectionStateTx) {
    peer_connection.on_ice_connection_state_change(Box::new(
        move |connection_state: RTCIceConnectionState| {
            log::info!("ICE Connection State has changed: {connection_state}");
            Box::pin(async {})
        },
    ));

    peer_connection.on_peer_connection_state_change(Box::new(
        move |s: RTCPeerConnectionState| {
            println!("Peer Connection State has changed: {s}");
            state_tx.publish(s.into());
            Box::pin(async {})
        },
    ));
}

/// answer applies the remote offer and returns the local answer once ICE
/// gathering is complete
async fn answer(
    peer_connection: &RTCPeerConnection,
    offer: RTCSessionDescription,
) -> Result<RTCSessionDescription> {
    // Set the remote SessionDescription
    peer_connection.set_remote_description(offer).await?;

    // Create an answer
    let answer = peer_connection.create_answer(None).await?;

    // Create channel that is blocked until ICE Gathering is complete
    let mut gather_complete = peer_connection.gathering_complete_promise().await;

    // Sets the LocalDescription, and starts our UDP listeners
    peer_connection.set_local_description(answer).await?;

    // Block until ICE Gathering is complete, disabling trickle ICE
    // we do this because we only can exchange one signaling message
    // in a production application you should exchange ICE Candidates via OnICECandidate
    let _ = gather_complete.recv().await;

    peer_connection
        .local_description()
        .await
        .ok_or(Error::ErrNoLocalDescription)
}
