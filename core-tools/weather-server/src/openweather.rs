//! OpenWeather client and response normalization
//!
//! Talks to the OpenWeather 2.5 API (`/weather` and `/forecast`) and reduces
//! the provider payloads to the flat shapes the chat engine understands.
//! Every failure is returned as an `{"error": text}` mapping; nothing here
//! returns `Err` to the caller once the client is built.

use chrono::DateTime;
use reqwest::Client;
use sdk::{EngineError, SecretString};
use serde_json::{json, Value};
use std::time::Duration;

/// Placeholder for absent sunrise/sunset timestamps
pub const NOT_AVAILABLE: &str = "N/A";

/// Client for the OpenWeather current-conditions and forecast endpoints
#[derive(Debug, Clone)]
pub struct OpenWeatherService {
    base_url: String,
    api_key: SecretString,
    client: Client,
}

impl OpenWeatherService {
    /// Create a new client with the given upstream timeout
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Current conditions for a city
    pub async fn get_weather(&self, city: &str, country_code: Option<&str>) -> Value {
        if city.trim().is_empty() {
            return city_required();
        }

        match self.fetch("weather", city, country_code).await {
            Ok(data) => normalize_current(&data),
            Err(error) => json!({ "error": error }),
        }
    }

    /// Multi-day forecast for a city, aggregated per local calendar day
    pub async fn get_forecast(&self, city: &str, country_code: Option<&str>, days: usize) -> Value {
        if city.trim().is_empty() {
            return city_required();
        }

        match self.fetch("forecast", city, country_code).await {
            Ok(data) => summarize_forecast(&data, days),
            Err(error) => json!({ "error": error }),
        }
    }

    /// Issue one upstream GET and decode the JSON body.
    ///
    /// The request URL carries the API key, so transport errors are reported
    /// without it.
    async fn fetch(
        &self,
        endpoint: &str,
        city: &str,
        country_code: Option<&str>,
    ) -> Result<Value, String> {
        let location = match country_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => format!("{},{}", city.trim(), code),
            None => city.trim().to_string(),
        };
        let url = format!("{}/{}", self.base_url, endpoint);

        tracing::debug!("OpenWeather request: endpoint={}, q={}", endpoint, location);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", location.as_str()),
                ("appid", self.api_key.unsecure()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| format!("Request error: {}", e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("OpenWeather returned {} for q={}", status.as_u16(), location);
            return Err(format!(
                "HTTP error: {} - {}",
                status.as_u16(),
                upstream_message(&body)
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("Unexpected error: {}", e.without_url()))
    }
}

fn city_required() -> Value {
    json!({ "error": "City name is required." })
}

/// Prefer the provider's `message` field over the raw error body
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Reduce a `/weather` payload to the current-conditions record.
pub fn normalize_current(data: &Value) -> Value {
    let main = &data["main"];
    let offset = data["timezone"].as_i64().unwrap_or(0);

    json!({
        "city": data["name"].as_str().unwrap_or_default(),
        "country": data["sys"]["country"].as_str().unwrap_or_default(),
        "temperature": round1(main["temp"].as_f64().unwrap_or(0.0)),
        "feels_like": round1(main["feels_like"].as_f64().unwrap_or(0.0)),
        "description": title_case(data["weather"][0]["description"].as_str().unwrap_or_default()),
        "humidity": main["humidity"].as_u64().unwrap_or(0),
        "wind_speed": data["wind"]["speed"].as_f64().unwrap_or(0.0),
        "temp_min": round1(main["temp_min"].as_f64().unwrap_or(0.0)),
        "temp_max": round1(main["temp_max"].as_f64().unwrap_or(0.0)),
        "sunrise": format_local_time(data["sys"]["sunrise"].as_i64().unwrap_or(0), offset),
        "sunset": format_local_time(data["sys"]["sunset"].as_i64().unwrap_or(0), offset),
    })
}

/// Samples collected for one local calendar date
struct DayBucket {
    date: String,
    temps: Vec<f64>,
    descriptions: Vec<String>,
}

/// Group a `/forecast` payload by local date and summarize the first `days` dates.
///
/// Each day carries the min/max of its own samples and the most frequent
/// description (first seen wins a tie). Sunrise/sunset are location-level in
/// the provider payload and are repeated for every day.
pub fn summarize_forecast(data: &Value, days: usize) -> Value {
    let city = &data["city"];
    let offset = city["timezone"].as_i64().unwrap_or(0);
    let sunrise = format_local_time(city["sunrise"].as_i64().unwrap_or(0), offset);
    let sunset = format_local_time(city["sunset"].as_i64().unwrap_or(0), offset);

    let mut buckets: Vec<DayBucket> = Vec::new();
    let samples = data["list"].as_array().map(Vec::as_slice).unwrap_or_default();

    for sample in samples {
        let Some(date) = sample["dt"].as_i64().and_then(|ts| local_date(ts, offset)) else {
            continue;
        };
        let temp = sample["main"]["temp"].as_f64().unwrap_or(0.0);
        let description = sample["weather"][0]["description"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        match buckets.iter_mut().find(|b| b.date == date) {
            Some(bucket) => {
                bucket.temps.push(temp);
                bucket.descriptions.push(description);
            }
            None => buckets.push(DayBucket {
                date,
                temps: vec![temp],
                descriptions: vec![description],
            }),
        }
    }

    let forecasts: Vec<Value> = buckets
        .iter()
        .take(days)
        .map(|bucket| {
            let min = bucket.temps.iter().copied().fold(f64::INFINITY, f64::min);
            let max = bucket.temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            json!({
                "date": bucket.date,
                "temp_min": round1(min),
                "temp_max": round1(max),
                "description": title_case(modal(&bucket.descriptions)),
                "sunrise": sunrise,
                "sunset": sunset,
            })
        })
        .collect();

    if forecasts.is_empty() {
        return json!({ "message": "Forecast not available yet." });
    }

    json!({
        "city": city["name"].as_str().unwrap_or_default(),
        "country": city["country"].as_str().unwrap_or_default(),
        "forecasts": forecasts,
    })
}

/// Most frequent value; ties resolve to the value encountered first.
fn modal(values: &[String]) -> &str {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value.as_str()) {
            Some((_, count)) => *count += 1,
            None => counts.push((value.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value).unwrap_or_default()
}

/// `YYYY-MM-DD` of a UTC epoch shifted by the location's UTC offset
fn local_date(timestamp: i64, offset_secs: i64) -> Option<String> {
    timestamp
        .checked_add(offset_secs)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// 12-hour local clock string (`hh:mm AM/PM`) for a UTC epoch and UTC offset.
///
/// Zero timestamps mean the provider had no value and render as `N/A`.
pub fn format_local_time(timestamp: i64, offset_secs: i64) -> String {
    if timestamp == 0 {
        return NOT_AVAILABLE.to_string();
    }
    timestamp
        .checked_add(offset_secs)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%I:%M %p").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Round half away from zero to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Uppercase the first letter of every word, lowercase the rest
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
