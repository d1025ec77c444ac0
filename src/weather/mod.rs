use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::geo::GeoPoint;

/// Stands in for the summary whenever the lookup fails.
pub const WEATHER_UNAVAILABLE: &str = "Weather data unavailable";

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub condition: String,
    pub humidity_percent: f64,
    pub wind_speed_kmh: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
}

#[derive(Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    #[serde(default)]
    weather_code: u32,
}

pub struct WeatherClient {
    client: Client,
    base: String,
    forecast_days: u32,
}

impl WeatherClient {
    pub fn new(base: &str, forecast_days: u32, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base: base.trim_end_matches('/').to_string(), forecast_days })
    }

    pub async fn current(&self, at: GeoPoint) -> Result<CurrentWeather> {
        let url = format!("{}/v1/forecast", self.base);
        debug!(%url, lat = at.latitude, lon = at.longitude, "weather lookup");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("latitude", at.latitude.to_string()),
                ("longitude", at.longitude.to_string()),
                ("current", "temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code".to_string()),
                ("forecast_days", self.forecast_days.to_string()),
            ])
            .send()
            .await
            .context("weather request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("weather read body failed")?;
        if !status.is_success() {
            return Err(anyhow!("weather API error ({}): {}", status, text));
        }
        parse_current(&text)
    }

    /// Summary line for the prompt, or the sentinel when anything went wrong.
    pub async fn summary_or_unavailable(&self, at: GeoPoint) -> String {
        match self.current(at).await {
            Ok(w) => format_weather_summary(&w),
            Err(e) => {
                warn!(error = %e, "weather lookup failed; continuing without it");
                WEATHER_UNAVAILABLE.to_string()
            }
        }
    }
}

fn parse_current(text: &str) -> Result<CurrentWeather> {
    let parsed: ForecastResponse =
        serde_json::from_str(text).map_err(|e| anyhow!("weather response parse error: {}", e))?;
    let c = parsed.current;
    Ok(CurrentWeather {
        temperature_c: c.temperature_2m,
        condition: describe_weather_code(c.weather_code).to_string(),
        humidity_percent: c.relative_humidity_2m,
        wind_speed_kmh: c.wind_speed_10m,
    })
}

pub fn format_weather_summary(w: &CurrentWeather) -> String {
    format!(
        "{:.1} C, {}, humidity {:.0}%, wind {:.1} km/h",
        w.temperature_c, w.condition, w.humidity_percent, w.wind_speed_kmh
    )
}

/// WMO weather interpretation codes.
pub fn describe_weather_code(code: u32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 | 56 | 57 => "Drizzle",
        61 | 63 | 65 | 66 | 67 => "Rain",
        71 | 73 | 75 | 77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 | 96 | 99 => "Thunderstorm",
        _ => "Unknown conditions",
    }
}
