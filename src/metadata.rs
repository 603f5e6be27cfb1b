use crate::state::{RedrawSignal, lock_or_recover, sleep_cancellable};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// How often the media session is re-queried.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Track info surfaced by the OS media session, drawn under the bars.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
}

impl NowPlaying {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.artist.is_empty()
    }

    /// The render line: "Title - Artist", a lone part without the dash,
    /// `None` when there is nothing to show.
    pub fn line(&self) -> Option<String> {
        match (self.title.is_empty(), self.artist.is_empty()) {
            (true, true) => None,
            (false, true) => Some(self.title.clone()),
            (true, false) => Some(self.artist.clone()),
            (false, false) => Some(format!("{} - {}", self.title, self.artist)),
        }
    }
}

/// Why a media-session query produced no metadata. Every kind is handled
/// the same way by the poller: the stored strings are cleared.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no active media session")]
    NoSession,
    #[error("media session manager unavailable: {0}")]
    Manager(String),
    #[error("media properties query failed: {0}")]
    Properties(String),
    #[error("media sessions are not exposed on this platform")]
    Unsupported,
}

#[cfg(windows)]
fn query_now_playing() -> Result<NowPlaying, MetadataError> {
    use windows::Media::Control::GlobalSystemMediaTransportControlsSessionManager;

    let manager = GlobalSystemMediaTransportControlsSessionManager::RequestAsync()
        .and_then(|op| op.get())
        .map_err(|e| MetadataError::Manager(e.message()))?;
    let sessions = manager
        .GetSessions()
        .map_err(|e| MetadataError::Manager(e.message()))?;
    if sessions
        .Size()
        .map_err(|e| MetadataError::Manager(e.message()))?
        == 0
    {
        return Err(MetadataError::NoSession);
    }

    // index 0 is the foremost session, the one the OS media flyout shows
    let session = sessions
        .GetAt(0)
        .map_err(|e| MetadataError::Manager(e.message()))?;
    let props = session
        .TryGetMediaPropertiesAsync()
        .and_then(|op| op.get())
        .map_err(|e| MetadataError::Properties(e.message()))?;
    let title = props
        .Title()
        .map_err(|e| MetadataError::Properties(e.message()))?;
    let artist = props
        .Artist()
        .map_err(|e| MetadataError::Properties(e.message()))?;

    Ok(NowPlaying {
        title: title.to_string(),
        artist: artist.to_string(),
    })
}

#[cfg(not(windows))]
fn query_now_playing() -> Result<NowPlaying, MetadataError> {
    Err(MetadataError::Unsupported)
}

/// Folds one query result into the shared slot. Returns true when the
/// stored value changed and the overlay should repaint.
fn store_result(slot: &Mutex<NowPlaying>, result: Result<NowPlaying, MetadataError>) -> bool {
    let fetched = match result {
        Ok(now_playing) => now_playing,
        Err(err) => {
            debug!("Metadata query yielded nothing: {err}");
            NowPlaying::default()
        }
    };

    let mut current = lock_or_recover(slot);
    if *current == fetched {
        return false;
    }
    if fetched.is_empty() {
        info!("Now playing: <nothing>");
    } else {
        info!("Now playing: {}", fetched.line().unwrap_or_default());
    }
    *current = fetched;
    true
}

/// Metadata thread body: polls the media session until shutdown.
pub fn run(slot: Arc<Mutex<NowPlaying>>, redraw: Arc<RedrawSignal>, shutdown: Arc<AtomicBool>) {
    debug!("Metadata thread started");
    while !shutdown.load(Ordering::Relaxed) {
        if store_result(&slot, query_now_playing()) {
            redraw.request();
        }
        sleep_cancellable(&shutdown, POLL_INTERVAL);
    }
    debug!("Metadata thread shutting down");
}
