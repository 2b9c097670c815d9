//! Rule-based weather suggestions
//!
//! Fetches current conditions through the weather capability and derives
//! short activity and clothing tips. Never fails: any problem yields the
//! generic fallback tip.

use chrono::Utc;
use sdk::{Suggestion, SuggestionPriority, SuggestionResponse, WeatherData};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::tools::weather::result_error;
use crate::tools::{WeatherCapability, GET_WEATHER};

const PRECIPITATION_WORDS: [&str; 5] = ["rain", "drizzle", "shower", "thunderstorm", "snow"];

/// Wind speed (m/s) from which a wind advisory is added
const WINDY_MS: f64 = 10.0;

const HOT_C: f64 = 32.0;
const FREEZING_C: f64 = 0.0;

pub struct SuggestionService {
    weather: Arc<dyn WeatherCapability>,
}

fn suggestion(
    category: &str,
    text: impl Into<String>,
    priority: SuggestionPriority,
    icon: &str,
) -> Suggestion {
    Suggestion {
        category: category.to_string(),
        suggestion: text.into(),
        priority,
        icon: icon.to_string(),
    }
}

/// Tip returned whenever conditions cannot be fetched
pub fn fallback_suggestion() -> Suggestion {
    suggestion(
        "General",
        "Check weather conditions before going out",
        SuggestionPriority::Medium,
        "🌤️",
    )
}

fn has_precipitation(description: &str) -> bool {
    let lower = description.to_lowercase();
    PRECIPITATION_WORDS.iter().any(|word| lower.contains(word))
}

/// Derive suggestions from current conditions
pub fn suggestions_for(weather: &WeatherData) -> Vec<Suggestion> {
    let wet = has_precipitation(&weather.description);
    let mut suggestions = Vec::new();

    if wet {
        suggestions.push(suggestion(
            "Outdoor Activity",
            format!("{} expected, indoor plans may be better today", weather.description),
            SuggestionPriority::Medium,
            "🏠",
        ));
        suggestions.push(suggestion(
            "Umbrella",
            "Take an umbrella or a rain jacket",
            SuggestionPriority::High,
            "☔",
        ));
    } else {
        suggestions.push(suggestion(
            "Outdoor Activity",
            format!(
                "Great weather for outdoor activities at {}°C",
                weather.temperature
            ),
            SuggestionPriority::Medium,
            "🏃",
        ));
    }

    suggestions.push(suggestion(
        "Clothing",
        format!("Dress appropriately for {}", weather.description.to_lowercase()),
        SuggestionPriority::High,
        "👕",
    ));

    if weather.temperature >= HOT_C {
        suggestions.push(suggestion(
            "Heat",
            "Stay hydrated and avoid the midday sun",
            SuggestionPriority::High,
            "🥵",
        ));
    } else if weather.temperature <= FREEZING_C {
        suggestions.push(suggestion(
            "Cold",
            "Temperatures are below freezing, wear warm layers",
            SuggestionPriority::High,
            "🧣",
        ));
    }

    if weather.wind_speed >= WINDY_MS {
        suggestions.push(suggestion(
            "Wind",
            format!("Strong winds at {} m/s, secure loose items", weather.wind_speed),
            SuggestionPriority::Low,
            "💨",
        ));
    }

    suggestions
}

impl SuggestionService {
    pub fn new(weather: Arc<dyn WeatherCapability>) -> Self {
        Self { weather }
    }

    pub async fn generate(&self, city: &str, context: Option<&str>) -> SuggestionResponse {
        if let Some(context) = context {
            debug!("Suggestion context for {}: {}", city, context);
        }

        let mut params = Map::new();
        params.insert("city".to_string(), json!(city));
        let result = self.weather.invoke(GET_WEATHER, &params).await;

        let suggestions = match parse_weather(result) {
            Ok(weather) => suggestions_for(&weather),
            Err(reason) => {
                warn!("Falling back to generic suggestions for {}: {}", city, reason);
                vec![fallback_suggestion()]
            }
        };

        SuggestionResponse {
            city: city.to_string(),
            suggestions,
            generated_at: Utc::now(),
        }
    }
}

fn parse_weather(result: Value) -> Result<WeatherData, String> {
    if let Some(error) = result_error(&result) {
        return Err(error);
    }
    serde_json::from_value(result).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedWeather(Value);

    #[async_trait]
    impl WeatherCapability for FixedWeather {
        async fn invoke(&self, _method: &str, _params: &Map<String, Value>) -> Value {
            self.0.clone()
        }

        async fn check_health(&self) -> bool {
            true
        }
    }

    fn weather(temperature: f64, description: &str, wind_speed: f64) -> WeatherData {
        WeatherData {
            city: "Dhaka".to_string(),
            country: "BD".to_string(),
            temperature,
            feels_like: temperature,
            description: description.to_string(),
            humidity: 60,
            wind_speed,
            temp_min: temperature,
            temp_max: temperature,
            sunrise: "N/A".to_string(),
            sunset: "N/A".to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn test_pleasant_weather() {
        let suggestions = suggestions_for(&weather(22.5, "Clear Sky", 2.0));
        assert_eq!(suggestions.len(), 2);
        assert_eq!(
            suggestions[0].suggestion,
            "Great weather for outdoor activities at 22.5°C"
        );
        assert_eq!(suggestions[1].suggestion, "Dress appropriately for clear sky");
        assert_eq!(suggestions[1].priority, SuggestionPriority::High);
    }

    #[test]
    fn test_rainy_weather() {
        let suggestions = suggestions_for(&weather(18.0, "Light Rain", 3.0));
        let categories: Vec<&str> = suggestions.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(categories, vec!["Outdoor Activity", "Umbrella", "Clothing"]);
        assert_eq!(suggestions[0].icon, "🏠");
    }

    #[test]
    fn test_extremes() {
        let hot = suggestions_for(&weather(38.0, "Clear Sky", 12.0));
        assert!(hot.iter().any(|s| s.category == "Heat"));
        assert!(hot.iter().any(|s| s.category == "Wind"));

        let cold = suggestions_for(&weather(-4.0, "Snow", 1.0));
        assert!(cold.iter().any(|s| s.category == "Cold"));
        assert!(cold.iter().any(|s| s.category == "Umbrella"));
    }

    #[tokio::test]
    async fn test_error_result_falls_back() {
        let service = SuggestionService::new(Arc::new(FixedWeather(
            json!({"error": "HTTP error: 404 - city not found"}),
        )));
        let response = service.generate("Atlantis", None).await;
        assert_eq!(response.city, "Atlantis");
        assert_eq!(response.suggestions, vec![fallback_suggestion()]);
    }

    #[tokio::test]
    async fn test_malformed_result_falls_back() {
        let service = SuggestionService::new(Arc::new(FixedWeather(json!({"city": "Dhaka"}))));
        let response = service.generate("Dhaka", Some("going hiking")).await;
        assert_eq!(response.suggestions.len(), 1);
        assert_eq!(response.suggestions[0].category, "General");
    }

    #[tokio::test]
    async fn test_live_conditions() {
        let service = SuggestionService::new(Arc::new(FixedWeather(json!({
            "city": "Dhaka", "country": "BD", "temperature": 26.0, "feels_like": 27.0,
            "description": "Few Clouds", "humidity": 65, "wind_speed": 2.5,
            "temp_min": 25.0, "temp_max": 27.0, "sunrise": "05:45 AM", "sunset": "06:10 PM"
        }))));
        let response = service.generate("Dhaka", None).await;
        assert_eq!(response.suggestions[0].category, "Outdoor Activity");
    }
}
