//! Spotify Web API client.
//!
//! Client-credentials token exchange and batched track lookups. Failures of a
//! single batch never abort the run: the batch simply contributes no metadata.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ApiTrack, MetadataMap, TokenResponse, TrackMetadata, TracksResponse};
use crate::region::country_from_isrc;

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const TRACKS_URL: &str = "https://api.spotify.com/v1/tracks";

/// Timeout applied to every request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a 429 before moving on to the next batch.
pub const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(5);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limited by the API (HTTP 429)")]
    RateLimited,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(#[from] std::io::Error),
    #[error("token endpoint returned no access_token")]
    MissingToken,
}

impl From<ureq::Error> for ApiError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(429, _) => ApiError::RateLimited,
            ureq::Error::Status(code, _) => ApiError::Status(code),
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}

// ============================================================================
// Metadata Source
// ============================================================================

/// Outcome of one batch lookup, for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Ok,
    RateLimited,
    Failed,
}

/// Anything that can resolve a batch of track ids to metadata.
pub trait MetadataSource {
    /// Look up one batch. Ids the source does not know are simply absent from
    /// the returned map.
    fn fetch_batch(&mut self, track_ids: &[String]) -> (MetadataMap, BatchOutcome);
}

// ============================================================================
// Client
// ============================================================================

pub struct SpotifyClient {
    agent: ureq::Agent,
    token: String,
    tracks_url: String,
    rate_limit_pause: Duration,
}

fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build()
}

impl SpotifyClient {
    /// Exchange client credentials for a bearer token and build a client.
    pub fn connect(client_id: &str, client_secret: &str) -> Result<Self, ApiError> {
        let client = Self::with_endpoint(TRACKS_URL, "", RATE_LIMIT_PAUSE);
        let token = request_token(&client.agent, TOKEN_URL, client_id, client_secret)?;
        Ok(Self { token, ..client })
    }

    /// Client for an already issued token.
    pub(crate) fn with_endpoint(
        tracks_url: &str,
        token: &str,
        rate_limit_pause: Duration,
    ) -> Self {
        Self {
            agent: build_agent(),
            token: token.to_string(),
            tracks_url: tracks_url.to_string(),
            rate_limit_pause,
        }
    }

    fn get_tracks(&self, track_ids: &[String]) -> Result<MetadataMap, ApiError> {
        let ids = track_ids.join(",");
        let response = self
            .agent
            .get(&self.tracks_url)
            .query("ids", &ids)
            .set("Authorization", &format!("Bearer {}", self.token))
            .call()?;

        let body: TracksResponse = response.into_json()?;
        Ok(collect_metadata(body))
    }
}

impl MetadataSource for SpotifyClient {
    fn fetch_batch(&mut self, track_ids: &[String]) -> (MetadataMap, BatchOutcome) {
        match self.get_tracks(track_ids) {
            Ok(map) => {
                debug!("batch of {} ids -> {} tracks", track_ids.len(), map.len());
                (map, BatchOutcome::Ok)
            }
            Err(ApiError::RateLimited) => {
                warn!(
                    "rate limited, pausing {}s before the next batch",
                    self.rate_limit_pause.as_secs()
                );
                thread::sleep(self.rate_limit_pause);
                (MetadataMap::default(), BatchOutcome::RateLimited)
            }
            Err(e) => {
                warn!("batch error: {}", e);
                (MetadataMap::default(), BatchOutcome::Failed)
            }
        }
    }
}

fn basic_auth(client_id: &str, client_secret: &str) -> String {
    let encoded = STANDARD.encode(format!("{}:{}", client_id, client_secret));
    format!("Basic {}", encoded)
}

fn request_token(
    agent: &ureq::Agent,
    url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, ApiError> {
    let response = agent
        .post(url)
        .set("Authorization", &basic_auth(client_id, client_secret))
        .send_form(&[("grant_type", "client_credentials")])?;

    let body: TokenResponse = response.into_json()?;
    body.access_token
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingToken)
}

// ============================================================================
// Response Mapping
// ============================================================================

/// Turn one API track into metadata. Tracks without an album are skipped.
pub fn metadata_from_track(track: &ApiTrack) -> Option<TrackMetadata> {
    let album = track.album.as_ref()?;

    let year = album
        .release_date
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| d.chars().take(4).collect::<String>());

    let image = album.images.first().map(|img| img.url.clone());

    let isrc = track
        .external_ids
        .as_ref()
        .and_then(|ids| ids.isrc.as_deref());
    let (country, region) = country_from_isrc(isrc);

    Some(TrackMetadata {
        year,
        image,
        preview: track.preview_url.clone(),
        country,
        region,
    })
}

pub fn collect_metadata(response: TracksResponse) -> MetadataMap {
    response
        .tracks
        .iter()
        .flatten()
        .filter_map(|t| metadata_from_track(t).map(|m| (t.id.clone(), m)))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
