//! Transfer session orchestration.
//!
//! One orchestrator run drives one session end to end: resolve the playlist
//! selection, match each track, mirror each playlist on the destination, and
//! narrate every step onto the progress stream. The stream is the session's
//! only output; once the consumer hangs up, the run stops issuing catalog
//! calls.

use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::{ProgressSink, TransferEvent};
use crate::models::{MatchThresholds, Playlist, PlaylistSelection, TransferRequest};
use crate::services::catalog::CatalogClient;
use crate::services::matcher::TrackMatcher;

/// Per-call ceiling both services accept for a track-append batch.
const ADD_TRACKS_BATCH_LIMIT: usize = 100;
/// Progress channel depth; a consumer this far behind stalls the producer.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Drives one transfer session between two catalogs.
pub struct TransferOrchestrator {
    source: Arc<dyn CatalogClient>,
    destination: Arc<dyn CatalogClient>,
    matcher: TrackMatcher,
    session_id: Uuid,
}

/// Public entry point for one session. The caller picks the thresholds
/// (direction defaults, possibly overridden from configuration).
pub fn start_transfer(
    source: Arc<dyn CatalogClient>,
    destination: Arc<dyn CatalogClient>,
    request: TransferRequest,
    thresholds: MatchThresholds,
) -> ReceiverStream<TransferEvent> {
    TransferOrchestrator::new(source, destination, thresholds).start(request.selection)
}

impl TransferOrchestrator {
    pub fn new(
        source: Arc<dyn CatalogClient>,
        destination: Arc<dyn CatalogClient>,
        thresholds: MatchThresholds,
    ) -> Self {
        TransferOrchestrator {
            source,
            destination,
            matcher: TrackMatcher::new(thresholds),
            session_id: Uuid::new_v4(),
        }
    }

    /// Spawn the session and hand back its event stream.
    ///
    /// The spawned task owns the orchestrator; dropping the stream cancels
    /// the session at its next emission point.
    pub fn start(self, selection: PlaylistSelection) -> ReceiverStream<TransferEvent> {
        let (sink, stream) = ProgressSink::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            self.run(selection, sink).await;
        });
        stream
    }

    async fn run(self, selection: PlaylistSelection, sink: ProgressSink) {
        let session_id = self.session_id;
        tracing::info!(%session_id, source = self.source.service_name(), destination = self.destination.service_name(), "Transfer session started");

        let mut last_completed: Option<String> = None;
        match self.drive(selection, &sink, &mut last_completed).await {
            Ok(()) => {
                tracing::info!(%session_id, "Transfer session complete");
            }
            Err(Error::StreamClosed) => {
                // Consumer hung up; nobody is listening, stop quietly.
                tracing::info!(%session_id, "Progress consumer disconnected, session cancelled");
            }
            Err(e) => {
                tracing::error!(%session_id, error = %e, "Transfer session failed");
                let _ = sink
                    .send(TransferEvent::Error {
                        message: e.to_string(),
                        last_completed_playlist_id: last_completed,
                    })
                    .await;
            }
        }
    }

    async fn drive(
        &self,
        selection: PlaylistSelection,
        sink: &ProgressSink,
        last_completed: &mut Option<String>,
    ) -> Result<()> {
        let playlists = self.resolve_selection(selection).await?;
        sink.send(TransferEvent::Start { total_playlists: playlists.len() }).await?;

        for playlist in playlists {
            self.transfer_playlist(&playlist, sink).await?;
            *last_completed = Some(playlist.id);
        }

        sink.send(TransferEvent::Done).await?;
        Ok(())
    }

    /// Expand the selection into the concrete source playlists to transfer,
    /// preserving the source service's listing order.
    async fn resolve_selection(&self, selection: PlaylistSelection) -> Result<Vec<Playlist>> {
        match selection {
            PlaylistSelection::All => self.source.list_playlists().await,
            PlaylistSelection::Ids(ids) => {
                // Ids that match nothing visible fall out of the filter; the
                // session then runs over whatever remains, possibly nothing.
                let visible = self.source.list_playlists().await?;
                Ok(visible.into_iter().filter(|p| ids.contains(&p.id)).collect())
            }
            PlaylistSelection::ExternalReference(reference) => {
                let playlist = self.source.resolve_playlist_reference(&reference).await?;
                Ok(vec![playlist])
            }
        }
    }

    async fn transfer_playlist(&self, playlist: &Playlist, sink: &ProgressSink) -> Result<()> {
        let listing = self.source.list_playlist_tracks(&playlist.id).await?;
        if listing.truncated {
            tracing::warn!(
                playlist = %playlist.name,
                gathered = listing.tracks.len(),
                "Track listing truncated by a failed page, transferring what was gathered"
            );
        }
        let tracks = listing.tracks;
        let total = tracks.len();

        sink.send(TransferEvent::PlaylistStart {
            playlist_id: playlist.id.clone(),
            name: playlist.name.clone(),
            total_tracks: total,
        })
        .await?;

        let mut matched_ids = Vec::new();
        for (index, track) in tracks.iter().enumerate() {
            let verdict = self.matcher.match_track(track, self.destination.as_ref()).await;
            if let Some(target_id) = verdict.target_id() {
                matched_ids.push(target_id.to_string());
            }
            sink.send(TransferEvent::Track {
                playlist_id: playlist.id.clone(),
                index,
                total,
                track_name: track.title.clone(),
                status: verdict.status(),
                target_id: verdict.target_id().map(String::from),
                confidence: verdict.confidence(),
            })
            .await?;
        }

        let created_id = self.create_destination_playlist(playlist, &matched_ids).await;
        tracing::info!(
            playlist = %playlist.name,
            matched = matched_ids.len(),
            total,
            created = created_id.is_some(),
            "Playlist transferred"
        );

        sink.send(TransferEvent::PlaylistComplete {
            playlist_id: playlist.id.clone(),
            name: playlist.name.clone(),
            created_id,
        })
        .await?;
        Ok(())
    }

    /// Mirror one playlist on the destination. Write failures are logged and
    /// absorbed: one playlist's failed creation must not abort the session,
    /// and a failed batch drops only that batch's tracks.
    async fn create_destination_playlist(
        &self,
        playlist: &Playlist,
        matched_ids: &[String],
    ) -> Option<String> {
        if matched_ids.is_empty() {
            tracing::warn!(playlist = %playlist.name, "No tracks matched, skipping creation");
            return None;
        }

        let created_id = match self
            .destination
            .create_playlist(&playlist.name, &playlist.description)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(playlist = %playlist.name, error = %e, "Playlist creation failed");
                return None;
            }
        };

        for batch in matched_ids.chunks(ADD_TRACKS_BATCH_LIMIT) {
            if let Err(e) = self.destination.add_tracks(&created_id, batch).await {
                tracing::warn!(
                    playlist = %playlist.name,
                    batch_len = batch.len(),
                    error = %e,
                    "Failed to add a track batch, continuing with the rest"
                );
            }
        }

        Some(created_id)
    }
}
