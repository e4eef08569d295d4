//! Track links and the music provider's oEmbed lookup.
//!
//! The owner pastes a track/playlist/album page URL; we derive the
//! embeddable player URL from it and resolve a display title through
//! the provider's oEmbed endpoint ("Title · Artist" format). The
//! lookup is best-effort — a failed oEmbed still yields a usable
//! now-playing entry with a generic title.

use std::time::Duration;

use serde::Deserialize;

use checkin_core::post::{MusicSnapshot, NowPlayingInput, TrackKind};

use crate::error::{Error, Result};

pub const MUSIC_SOURCE: &str = "spotify";

const LINK_HOST: &str = "open.spotify.com";
const OEMBED_URL: &str = "https://open.spotify.com/oembed";

// ─── Link parsing ────────────────────────────────────────────────────────────

/// A parsed music link: what it points at and the provider's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLink {
  pub kind: TrackKind,
  pub id:   String,
}

impl TrackLink {
  /// The iframe-embeddable player URL for this link.
  pub fn embed_url(&self) -> String {
    format!("https://{LINK_HOST}/embed/{}/{}", self.kind, self.id)
  }
}

/// Parse a track-page URL. Accepts locale segments
/// (`/intl-ko/track/<id>`) and trailing query strings.
pub fn parse_track_link(url: &str) -> Result<TrackLink> {
  let rest = url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url);
  let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
  if host != LINK_HOST {
    return Err(Error::TrackLink(url.to_string()));
  }

  let mut segments = path.split('/').filter(|s| !s.is_empty());
  while let Some(segment) = segments.next() {
    if let Ok(kind) = segment.parse::<TrackKind>() {
      let id = segments
        .next()
        .and_then(|s| s.split('?').next())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::TrackLink(url.to_string()))?;
      return Ok(TrackLink { kind, id: id.to_string() });
    }
  }
  Err(Error::TrackLink(url.to_string()))
}

/// Split an oEmbed display title into title and artist. The provider
/// formats these as `Title · Artist`; titles containing the separator
/// keep everything after the first occurrence as the artist.
pub fn split_oembed_title(raw: &str) -> (String, Option<String>) {
  match raw.split_once(" · ") {
    Some((title, artist)) => (title.to_string(), Some(artist.to_string())),
    None => (raw.to_string(), None),
  }
}

// ─── oEmbed lookup ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OembedResponse {
  #[serde(default)]
  title: Option<String>,
}

pub struct MusicLookup {
  http: reqwest::Client,
}

impl MusicLookup {
  pub fn new() -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self { http })
  }

  /// Parse `url` and resolve its display metadata. The oEmbed call is
  /// best-effort; on failure the entry keeps a generic title.
  pub async fn resolve(&self, url: &str) -> Result<NowPlayingInput> {
    let link = parse_track_link(url)?;

    let mut title = format!("Spotify {}", link.kind);
    let mut artist = None;
    match self.oembed_title(url).await {
      Ok(Some(raw)) => {
        let (t, a) = split_oembed_title(&raw);
        title = t;
        artist = a;
      }
      Ok(None) => {}
      Err(e) => {
        tracing::debug!(error = %e, "oEmbed lookup failed, keeping generic title");
      }
    }

    Ok(NowPlayingInput {
      embed_url: link.embed_url(),
      track_id: link.id,
      kind: link.kind,
      title,
      artist,
    })
  }

  async fn oembed_title(&self, url: &str) -> Result<Option<String>> {
    let response =
      self.http.get(OEMBED_URL).query(&[("url", url)]).send().await?;
    if !response.status().is_success() {
      return Err(Error::Server {
        status:  response.status().as_u16(),
        message: response.text().await.unwrap_or_default(),
      });
    }
    let body: OembedResponse = response.json().await?;
    Ok(body.title)
  }
}

/// The post-attachment snapshot for a resolved now-playing entry.
pub fn snapshot_for(input: &NowPlayingInput) -> MusicSnapshot {
  MusicSnapshot {
    title:    input.title.clone(),
    artist:   input.artist.clone(),
    source:   Some(MUSIC_SOURCE.to_string()),
    track_id: Some(input.track_id.clone()),
  }
}
