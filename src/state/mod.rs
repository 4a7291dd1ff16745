
use std::fmt;

use tokio::sync::watch;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

use crate::error::{Error, Result};

/// ConnectionState is the view of the transport the pacing loop acts on.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not (or no longer) able to carry media. Sending pauses.
    #[default]
    Disconnected,

    /// Media can flow.
    Connected,

    /// Terminal. The stream stops.
    Failed,
}

const CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const CONNECTION_STATE_FAILED_STR: &str = "failed";

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Connected => ConnectionState::Connected,
            RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => {
                ConnectionState::Failed
            }
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ConnectionState::Disconnected => CONNECTION_STATE_DISCONNECTED_STR,
            ConnectionState::Connected => CONNECTION_STATE_CONNECTED_STR,
            ConnectionState::Failed => CONNECTION_STATE_FAILED_STR,
        };
        write!(f, "{s}")
    }
}

/// connection_state_channel creates a publisher for the peer connection
/// handler and a subscriber for the pacing loop, starting `Disconnected`
pub fn connection_state_channel() -> (ConnectionStateTx, ConnectionStateRx) {
    let (tx, rx) = watch::channel(ConnectionState::Disconnected);
    (ConnectionStateTx(tx), ConnectionStateRx(rx))
}

pub struct ConnectionStateTx(watch::Sender<ConnectionState>);

impl ConnectionStateTx {
    /// publish stores the new state. `Failed` is sticky.
    pub fn publish(&self, state: ConnectionState) {
        self.0.send_if_modified(|current| {
            if *current == state || *current == ConnectionState::Failed {
                return false;
            }
            log::debug!("connection state {current} -> {state}");
            *current = state;
            true
        });
    }
}

#[derive(Clone)]
pub struct ConnectionStateRx(watch::Receiver<ConnectionState>);

impl ConnectionStateRx {
    pub fn current(&self) -> ConnectionState {
        *self.0.borrow()
    }

    /// wait_connected resolves once the state is `Connected`, or fails with
    /// `ErrConnectionFailed` if it reaches `Failed` first or the publisher
    /// goes away.
    pub async fn wait_connected(&mut self) -> Result<()> {
        let state = self
            .0
            .wait_for(|s| *s != ConnectionState::Disconnected)
            .await
            .map(|s| *s)
            .map_err(|_| Error::ErrConnectionFailed)?;

        match state {
            ConnectionState::Connected => Ok(()),
            _ => Err(Error::ErrConnectionFailed),
        }
    }
}
