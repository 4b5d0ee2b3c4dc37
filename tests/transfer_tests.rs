//! End-to-end orchestrator tests over in-memory catalog clients.
//!
//! The mocks record every call, so the tests assert both the event stream a
//! consumer sees and the catalog traffic behind it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_stream::StreamExt;

use playlift::error::{Error, Result};
use playlift::models::{
    CatalogSide, Direction, MatchStatus, MatchThresholds, Playlist, PlaylistSelection, Track,
    TransferRequest,
};
use playlift::services::catalog::{CatalogClient, TrackListing};
use playlift::{start_transfer, TransferEvent};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    ListPlaylists,
    Resolve(String),
    ListTracks(String),
    Search(String),
    Isrc(String),
    Create(String),
    Add(String, usize),
}

/// Scripted in-memory catalog. Reads serve from the configured fixtures;
/// failure flags turn individual operations into errors.
#[derive(Default)]
struct MockCatalog {
    playlists: Vec<Playlist>,
    fail_list_playlists: bool,
    tracks: HashMap<String, TrackListing>,
    fail_tracks: Vec<String>,
    resolved: Option<Playlist>,
    isrc_index: HashMap<String, Track>,
    search_results: Vec<Track>,
    fail_create: bool,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockCatalog {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn server_error() -> Error {
    Error::Api { status: 500, message: "scripted failure".into() }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    fn service_name(&self) -> &'static str {
        "mock"
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>> {
        self.record(Call::ListPlaylists);
        if self.fail_list_playlists {
            return Err(server_error());
        }
        Ok(self.playlists.clone())
    }

    async fn resolve_playlist_reference(&self, reference: &str) -> Result<Playlist> {
        self.record(Call::Resolve(reference.to_string()));
        self.resolved
            .clone()
            .ok_or_else(|| Error::InvalidSelection("playlist not found".into()))
    }

    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<TrackListing> {
        self.record(Call::ListTracks(playlist_id.to_string()));
        if self.fail_tracks.iter().any(|id| id == playlist_id) {
            return Err(server_error());
        }
        Ok(self
            .tracks
            .get(playlist_id)
            .cloned()
            .unwrap_or_else(|| TrackListing::complete(Vec::new())))
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        self.record(Call::Search(query.to_string()));
        Ok(self.search_results.iter().take(limit).cloned().collect())
    }

    async fn lookup_by_isrc(&self, isrc: &str) -> Result<Option<Track>> {
        self.record(Call::Isrc(isrc.to_string()));
        Ok(self.isrc_index.get(isrc).cloned())
    }

    async fn create_playlist(&self, name: &str, _description: &str) -> Result<String> {
        self.record(Call::Create(name.to_string()));
        if self.fail_create {
            return Err(server_error());
        }
        Ok(format!("created-{name}"))
    }

    async fn add_tracks(&self, playlist_id: &str, ids: &[String]) -> Result<()> {
        self.record(Call::Add(playlist_id.to_string(), ids.len()));
        Ok(())
    }
}

fn playlist(id: &str, name: &str) -> Playlist {
    Playlist {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        track_count: 0,
        side: CatalogSide::Source,
    }
}

fn track(id: &str, title: &str, isrc: Option<&str>) -> Track {
    Track {
        id: id.into(),
        title: title.into(),
        artists: vec!["Artist".into()],
        album: None,
        isrc: isrc.map(String::from),
        duration_ms: Some(200_000),
        explicit: None,
    }
}

/// Destination that resolves any ISRC the given tracks carry.
fn destination_with_isrcs(tracks: &[Track]) -> MockCatalog {
    let mut isrc_index = HashMap::new();
    for (n, t) in tracks.iter().enumerate() {
        if let Some(isrc) = &t.isrc {
            isrc_index.insert(isrc.clone(), track(&format!("dest-{n}"), &t.title, Some(isrc)));
        }
    }
    MockCatalog { isrc_index, ..MockCatalog::default() }
}

fn run(
    source: MockCatalog,
    destination: MockCatalog,
    selection: PlaylistSelection,
) -> (
    Arc<MockCatalog>,
    Arc<MockCatalog>,
    tokio_stream::wrappers::ReceiverStream<TransferEvent>,
) {
    let source = Arc::new(source);
    let destination = Arc::new(destination);
    let stream = start_transfer(
        source.clone(),
        destination.clone(),
        TransferRequest { direction: Direction::SpotifyToApple, selection },
        MatchThresholds::for_direction(Direction::SpotifyToApple),
    );
    (source, destination, stream)
}

async fn collect(
    mut stream: tokio_stream::wrappers::ReceiverStream<TransferEvent>,
) -> Vec<TransferEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn full_session_emits_the_documented_event_sequence() {
    let tracks = vec![
        track("t0", "Alpha", Some("ISRC0")),
        track("t1", "Beta", Some("ISRC1")),
        track("t2", "Gamma", Some("ISRC2")),
    ];
    let source = MockCatalog {
        playlists: vec![playlist("p1", "Road Trip")],
        tracks: HashMap::from([("p1".to_string(), TrackListing::complete(tracks.clone()))]),
        ..MockCatalog::default()
    };
    let destination = destination_with_isrcs(&tracks);

    let (_, destination, stream) = run(source, destination, PlaylistSelection::All);
    let events = collect(stream).await;

    assert_eq!(events.first(), Some(&TransferEvent::Start { total_playlists: 1 }));
    assert_eq!(
        events.get(1),
        Some(&TransferEvent::PlaylistStart {
            playlist_id: "p1".into(),
            name: "Road Trip".into(),
            total_tracks: 3,
        })
    );
    for (n, event) in events[2..5].iter().enumerate() {
        match event {
            TransferEvent::Track { playlist_id, index, total, status, confidence, .. } => {
                assert_eq!(playlist_id, "p1");
                assert_eq!(*index, n);
                assert_eq!(*total, 3);
                assert_eq!(*status, MatchStatus::Matched);
                // ISRC hits bypass heuristic scoring entirely.
                assert_eq!(*confidence, Some(1.0));
            }
            other => panic!("expected track event at position {n}, got {other:?}"),
        }
    }
    assert_eq!(
        events.get(5),
        Some(&TransferEvent::PlaylistComplete {
            playlist_id: "p1".into(),
            name: "Road Trip".into(),
            created_id: Some("created-Road Trip".into()),
        })
    );
    assert_eq!(events.get(6), Some(&TransferEvent::Done));
    assert_eq!(events.len(), 7);

    // Creation happened once, then one batch in source order.
    let writes: Vec<Call> = destination
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Create(_) | Call::Add(..)))
        .collect();
    assert_eq!(
        writes,
        vec![
            Call::Create("Road Trip".into()),
            Call::Add("created-Road Trip".into(), 3),
        ]
    );
}

#[tokio::test]
async fn empty_library_yields_start_and_done_only() {
    let (_, destination, stream) =
        run(MockCatalog::default(), MockCatalog::default(), PlaylistSelection::All);
    let events = collect(stream).await;
    assert_eq!(
        events,
        vec![TransferEvent::Start { total_playlists: 0 }, TransferEvent::Done]
    );
    assert_eq!(destination.call_count(), 0);
}

#[tokio::test]
async fn large_playlists_are_added_in_batches_of_one_hundred() {
    let tracks: Vec<Track> = (0..250)
        .map(|n| track(&format!("t{n}"), &format!("Song {n}"), Some(&format!("ISRC{n}"))))
        .collect();
    let source = MockCatalog {
        playlists: vec![playlist("p1", "Big")],
        tracks: HashMap::from([("p1".to_string(), TrackListing::complete(tracks.clone()))]),
        ..MockCatalog::default()
    };
    let destination = destination_with_isrcs(&tracks);

    let (_, destination, stream) = run(source, destination, PlaylistSelection::All);
    collect(stream).await;

    let batches: Vec<usize> = destination
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Add(_, len) => Some(len),
            _ => None,
        })
        .collect();
    assert_eq!(batches, vec![100, 100, 50]);
}

#[tokio::test]
async fn unmatched_tracks_are_reported_but_not_carried_over() {
    // One ISRC hit, one search hit, one nothing in the catalog resembles.
    let mut tracks = vec![
        track("t0", "Alpha", Some("ISRC0")),
        track("t1", "Beta", None),
        track("t2", "Gamma", None),
    ];
    tracks[2].artists = vec!["Someone Else".into()];
    let mut destination = destination_with_isrcs(&tracks[..1]);
    destination.search_results = vec![track("dest-beta", "Beta", None)];

    let source = MockCatalog {
        playlists: vec![playlist("p1", "Mixed")],
        tracks: HashMap::from([("p1".to_string(), TrackListing::complete(tracks))]),
        ..MockCatalog::default()
    };

    let (_, destination, stream) = run(source, destination, PlaylistSelection::All);
    let events = collect(stream).await;

    let statuses: Vec<MatchStatus> = events
        .iter()
        .filter_map(|e| match e {
            TransferEvent::Track { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    // "Gamma" finds the "Beta" candidate but its title does not agree, so it
    // falls below the low band: artist + duration only.
    assert_eq!(statuses[0], MatchStatus::Matched);
    assert_eq!(statuses[1], MatchStatus::Matched);
    assert_ne!(statuses[2], MatchStatus::Matched);

    let added: Vec<usize> = destination
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Add(_, len) => Some(len),
            _ => None,
        })
        .collect();
    assert_eq!(added, vec![2]);
}

#[tokio::test]
async fn playlist_with_no_matches_is_not_created() {
    let source = MockCatalog {
        playlists: vec![playlist("p1", "Obscure")],
        tracks: HashMap::from([(
            "p1".to_string(),
            TrackListing::complete(vec![track("t0", "Nothing Matches", None)]),
        )]),
        ..MockCatalog::default()
    };

    let (_, destination, stream) = run(source, MockCatalog::default(), PlaylistSelection::All);
    let events = collect(stream).await;

    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::PlaylistComplete { created_id: None, .. }
    )));
    assert_eq!(events.last(), Some(&TransferEvent::Done));
    assert!(!destination.calls().iter().any(|c| matches!(c, Call::Create(_))));
}

#[tokio::test]
async fn failed_creation_does_not_abort_the_session() {
    let tracks = vec![track("t0", "Alpha", Some("ISRC0"))];
    let mut destination = destination_with_isrcs(&tracks);
    destination.fail_create = true;

    let source = MockCatalog {
        playlists: vec![playlist("p1", "First"), playlist("p2", "Second")],
        tracks: HashMap::from([
            ("p1".to_string(), TrackListing::complete(tracks.clone())),
            ("p2".to_string(), TrackListing::complete(tracks)),
        ]),
        ..MockCatalog::default()
    };

    let (_, destination, stream) = run(source, destination, PlaylistSelection::All);
    let events = collect(stream).await;

    let completions: Vec<Option<String>> = events
        .iter()
        .filter_map(|e| match e {
            TransferEvent::PlaylistComplete { created_id, .. } => Some(created_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(completions, vec![None, None]);
    assert_eq!(events.last(), Some(&TransferEvent::Done));
    assert!(!destination.calls().iter().any(|c| matches!(c, Call::Add(..))));
}

#[tokio::test]
async fn truncated_listings_transfer_what_was_gathered() {
    let tracks = vec![track("t0", "Alpha", Some("ISRC0"))];
    let source = MockCatalog {
        playlists: vec![playlist("p1", "Partial")],
        tracks: HashMap::from([(
            "p1".to_string(),
            TrackListing { tracks: tracks.clone(), truncated: true },
        )]),
        ..MockCatalog::default()
    };

    let (_, _, stream) = run(source, destination_with_isrcs(&tracks), PlaylistSelection::All);
    let events = collect(stream).await;

    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::PlaylistStart { total_tracks: 1, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::PlaylistComplete { created_id: Some(_), .. }
    )));
    assert_eq!(events.last(), Some(&TransferEvent::Done));
}

#[tokio::test]
async fn source_failure_ends_the_stream_with_one_error_event() {
    let source = MockCatalog { fail_list_playlists: true, ..MockCatalog::default() };
    let (_, _, stream) = run(source, MockCatalog::default(), PlaylistSelection::All);
    let events = collect(stream).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        TransferEvent::Error { message, last_completed_playlist_id } => {
            assert!(message.contains("500"));
            assert_eq!(*last_completed_playlist_id, None);
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn mid_session_failure_names_the_last_completed_playlist() {
    let tracks = vec![track("t0", "Alpha", Some("ISRC0"))];
    let source = MockCatalog {
        playlists: vec![playlist("p1", "First"), playlist("p2", "Second")],
        tracks: HashMap::from([("p1".to_string(), TrackListing::complete(tracks.clone()))]),
        fail_tracks: vec!["p2".to_string()],
        ..MockCatalog::default()
    };

    let (_, _, stream) = run(source, destination_with_isrcs(&tracks), PlaylistSelection::All);
    let events = collect(stream).await;

    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::PlaylistComplete { playlist_id, .. } if playlist_id == "p1"
    )));
    assert_eq!(
        events.last(),
        Some(&TransferEvent::Error {
            message: "API error 500: scripted failure".into(),
            last_completed_playlist_id: Some("p1".into()),
        })
    );
    assert!(!events.contains(&TransferEvent::Done));
}

#[tokio::test]
async fn id_selection_filters_the_visible_playlists() {
    let source = MockCatalog {
        playlists: vec![playlist("p1", "Keep"), playlist("p2", "Skip")],
        tracks: HashMap::from([("p1".to_string(), TrackListing::complete(Vec::new()))]),
        ..MockCatalog::default()
    };

    let (source, _, stream) =
        run(source, MockCatalog::default(), PlaylistSelection::Ids(vec!["p1".to_string()]));
    let events = collect(stream).await;

    assert_eq!(events.first(), Some(&TransferEvent::Start { total_playlists: 1 }));
    assert!(source.calls().contains(&Call::ListTracks("p1".to_string())));
    assert!(!source.calls().contains(&Call::ListTracks("p2".to_string())));
}

#[tokio::test]
async fn unknown_id_selection_runs_as_an_empty_session() {
    let source = MockCatalog {
        playlists: vec![playlist("p1", "Only")],
        ..MockCatalog::default()
    };
    let (source, _, stream) =
        run(source, MockCatalog::default(), PlaylistSelection::Ids(vec!["nope".to_string()]));
    let events = collect(stream).await;

    assert_eq!(
        events,
        vec![TransferEvent::Start { total_playlists: 0 }, TransferEvent::Done]
    );
    assert!(!source.calls().iter().any(|c| matches!(c, Call::ListTracks(_))));
}

#[tokio::test]
async fn external_reference_resolves_one_playlist() {
    let source = MockCatalog {
        resolved: Some(playlist("pub1", "Shared Mix")),
        tracks: HashMap::from([("pub1".to_string(), TrackListing::complete(Vec::new()))]),
        ..MockCatalog::default()
    };

    let reference = "https://open.spotify.com/playlist/pub1";
    let (source, _, stream) = run(
        source,
        MockCatalog::default(),
        PlaylistSelection::ExternalReference(reference.to_string()),
    );
    let events = collect(stream).await;

    assert_eq!(source.calls().first(), Some(&Call::Resolve(reference.to_string())));
    assert_eq!(events.first(), Some(&TransferEvent::Start { total_playlists: 1 }));
    assert_eq!(events.last(), Some(&TransferEvent::Done));
}

#[tokio::test]
async fn caller_supplied_thresholds_govern_the_verdict_band() {
    // Title + duration agree, artist does not: score 0.7, which sits below
    // the default matched band but above a relaxed one.
    let source_track = track("t0", "Alpha", None);
    let mut candidate = track("dest-0", "Alpha", None);
    candidate.artists = vec!["Somebody Else".into()];

    let build_source = || MockCatalog {
        playlists: vec![playlist("p1", "Mix")],
        tracks: HashMap::from([(
            "p1".to_string(),
            TrackListing::complete(vec![source_track.clone()]),
        )]),
        ..MockCatalog::default()
    };
    let build_destination = || MockCatalog {
        search_results: vec![candidate.clone()],
        ..MockCatalog::default()
    };

    let request = || TransferRequest {
        direction: Direction::SpotifyToApple,
        selection: PlaylistSelection::All,
    };

    let default_stream = start_transfer(
        Arc::new(build_source()),
        Arc::new(build_destination()),
        request(),
        MatchThresholds::for_direction(Direction::SpotifyToApple),
    );
    let relaxed_stream = start_transfer(
        Arc::new(build_source()),
        Arc::new(build_destination()),
        request(),
        MatchThresholds { matched: 0.65, low_confidence: 0.4 },
    );

    let status_of = |events: &[TransferEvent]| {
        events
            .iter()
            .find_map(|e| match e {
                TransferEvent::Track { status, .. } => Some(*status),
                _ => None,
            })
            .expect("no track event")
    };

    assert_eq!(status_of(&collect(default_stream).await), MatchStatus::LowConfidence);
    assert_eq!(status_of(&collect(relaxed_stream).await), MatchStatus::Matched);
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_session() {
    // Enough tracks that the session cannot fit in the channel buffer.
    let tracks: Vec<Track> = (0..500)
        .map(|n| track(&format!("t{n}"), &format!("Song {n}"), Some(&format!("ISRC{n}"))))
        .collect();
    let source = MockCatalog {
        playlists: vec![playlist("p1", "Huge")],
        tracks: HashMap::from([("p1".to_string(), TrackListing::complete(tracks.clone()))]),
        ..MockCatalog::default()
    };

    let (_, destination, mut stream) =
        run(source, destination_with_isrcs(&tracks), PlaylistSelection::All);

    // Read the first two events, then hang up.
    assert!(matches!(stream.next().await, Some(TransferEvent::Start { .. })));
    assert!(matches!(stream.next().await, Some(TransferEvent::PlaylistStart { .. })));
    drop(stream);

    // Let the spawned session hit the closed channel and stop.
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
    let settled = destination.call_count();
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
    assert_eq!(destination.call_count(), settled);

    // The run stopped long before matching all 500 tracks, and never wrote.
    assert!(settled < 100, "session kept matching after cancellation: {settled} calls");
    assert!(!destination.calls().iter().any(|c| matches!(c, Call::Create(_) | Call::Add(..))));
}
