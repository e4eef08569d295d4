//! Current-conditions lookup from the third-party weather provider.
//!
//! Consumed read-only when the owner attaches weather to a post. Any
//! failure — network, quota, bad coordinates — degrades to a fixed
//! fallback snapshot rather than blocking authoring.

use std::time::Duration;

use serde::Deserialize;

use checkin_core::post::WeatherSnapshot;

use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Condition → display emoji. Unlisted conditions get a generic sky.
fn icon_for(condition: &str) -> &'static str {
  match condition {
    "clear" => "☀️",
    "clouds" => "☁️",
    "rain" => "🌧️",
    "drizzle" => "🌦️",
    "thunderstorm" => "⛈️",
    "snow" => "❄️",
    "mist" | "fog" | "haze" => "🌫️",
    _ => "🌤️",
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireWeather {
  main:    WireMain,
  weather: Vec<WireCondition>,
  name:    String,
}

#[derive(Debug, Deserialize)]
struct WireMain {
  temp: f64,
}

#[derive(Debug, Deserialize)]
struct WireCondition {
  main: String,
}

impl WireWeather {
  fn into_snapshot(self) -> WeatherSnapshot {
    let condition = self
      .weather
      .first()
      .map(|c| c.main.to_lowercase())
      .unwrap_or_default();
    WeatherSnapshot {
      temp: self.main.temp.round() as i32,
      icon: icon_for(&condition).to_string(),
      condition,
      location: self.name,
    }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct WeatherService {
  http:     reqwest::Client,
  base_url: String,
  api_key:  String,
}

impl WeatherService {
  pub fn new(api_key: impl Into<String>) -> Result<Self> {
    Self::with_base_url(DEFAULT_BASE_URL, api_key)
  }

  pub fn with_base_url(
    base_url: impl Into<String>,
    api_key: impl Into<String>,
  ) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self { http, base_url: base_url.into(), api_key: api_key.into() })
  }

  /// The snapshot used whenever the provider cannot be reached.
  pub fn fallback() -> WeatherSnapshot {
    WeatherSnapshot {
      temp:      18,
      condition: "clear".to_string(),
      icon:      "☀️".to_string(),
      location:  "Toronto".to_string(),
    }
  }

  /// Current conditions at the given coordinates, or the fallback.
  pub async fn current(&self, lat: f64, lon: f64) -> WeatherSnapshot {
    match self.fetch(lat, lon).await {
      Ok(snapshot) => snapshot,
      Err(e) => {
        tracing::warn!(error = %e, "weather lookup failed, using fallback");
        Self::fallback()
      }
    }
  }

  async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot> {
    let url = format!(
      "{}/data/2.5/weather",
      self.base_url.trim_end_matches('/')
    );
    let response = self
      .http
      .get(&url)
      .query(&[
        ("lat", lat.to_string()),
        ("lon", lon.to_string()),
        ("appid", self.api_key.clone()),
        ("units", "metric".to_string()),
      ])
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(Error::Server {
        status:  response.status().as_u16(),
        message: response.text().await.unwrap_or_default(),
      });
    }

    let wire: WireWeather = response.json().await?;
    Ok(wire.into_snapshot())
  }
}
