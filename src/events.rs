//! Transfer progress events and the channel they travel on.
//!
//! Events are broadcast as one JSON object each; the serialized shape is
//! part of the external contract (consumers already parse it), so the serde
//! attributes here are load-bearing.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{Error, Result};
use crate::models::MatchStatus;

/// Ordered progress events for one transfer session.
///
/// For a given playlist, `Track` events carry strictly increasing `index`
/// from 0 to `total - 1`, all between that playlist's `PlaylistStart` and
/// `PlaylistComplete`. The stream ends with exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum TransferEvent {
    Start {
        total_playlists: usize,
    },
    PlaylistStart {
        playlist_id: String,
        name: String,
        total_tracks: usize,
    },
    Track {
        playlist_id: String,
        index: usize,
        total: usize,
        track_name: String,
        status: MatchStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    PlaylistComplete {
        playlist_id: String,
        name: String,
        /// Absent if creation failed or zero tracks matched
        #[serde(skip_serializing_if = "Option::is_none")]
        created_id: Option<String>,
    },
    Done,
    Error {
        message: String,
        /// Lets a consumer tell completed playlists from the aborted one
        /// without replaying its own event history
        #[serde(skip_serializing_if = "Option::is_none")]
        last_completed_playlist_id: Option<String>,
    },
}

impl TransferEvent {
    /// Terminal event for a failure that precedes any session work, such as
    /// a missing credential. Precondition failures reach the consumer the
    /// same way mid-session failures do.
    pub fn fatal(error: &Error) -> TransferEvent {
        TransferEvent::Error {
            message: error.to_string(),
            last_completed_playlist_id: None,
        }
    }
}

/// Producer half of the progress stream.
///
/// Backed by a bounded channel: a slow consumer stalls the producer at the
/// point of emission, and a dropped consumer turns the next send into
/// [`Error::StreamClosed`], which the orchestrator treats as cancellation.
pub struct ProgressSink {
    tx: mpsc::Sender<TransferEvent>,
}

impl ProgressSink {
    /// Create a sink and its single consumer stream.
    pub fn channel(capacity: usize) -> (ProgressSink, ReceiverStream<TransferEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ProgressSink { tx }, ReceiverStream::new(rx))
    }

    pub async fn send(&self, event: TransferEvent) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::StreamClosed)
    }
}
