//! Command handlers
//!
//! One handler per CLI command. Handlers use `anyhow` and print for humans
//! (or JSON with `--json`); the engine underneath uses typed errors.

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::agent::EngineChat;
use crate::config::Config;
use crate::secrets::{SecretManager, OPENWEATHER_API_KEY};
use api_server::APIServer;
use sdk::errors::NimbusErrorExt;
use sdk::{ChatHandle, ChatResponse, CoreContext};
use weather_server::WeatherServer;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Build the weather service from config and the environment
fn build_weather_server(config: &Config, secrets: &SecretManager) -> Result<WeatherServer> {
    let api_key = secrets.get_secret(OPENWEATHER_API_KEY)?;
    let server = WeatherServer::new(config.weather_server.to_server_config(api_key))?;
    Ok(server)
}

async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Run the chat API, optionally with the weather service alongside
pub async fn handle_serve(config: &Config, with_weather_server: bool) -> Result<()> {
    let secrets = SecretManager::new();

    let mut weather = if with_weather_server {
        let mut server = build_weather_server(config, &secrets)?;
        let addr = server
            .start()
            .await
            .context("Failed to start weather service")?;
        println!("Weather service listening on http://{}", addr);
        Some(server)
    } else {
        None
    };

    let engine = EngineChat::from_config(config, &secrets).await?;
    let ctx = CoreContext::new(engine.into_handle());
    let mut api = APIServer::new(ctx, config.api.host.clone(), config.api.port);
    let addr = api.start().await.context("Failed to start chat API")?;
    println!("Nimbus chat API listening on http://{}", addr);
    println!("Press Ctrl+C to stop.");

    wait_for_shutdown().await;
    tracing::info!("Shutting down");

    api.stop();
    if let Some(server) = weather.as_mut() {
        server.stop();
    }
    Ok(())
}

/// Run only the weather service
pub async fn handle_weather_server(config: &Config) -> Result<()> {
    let mut server = build_weather_server(config, &SecretManager::new())?;
    let addr = server
        .start()
        .await
        .context("Failed to start weather service")?;
    println!("Weather service listening on http://{}", addr);
    println!("Press Ctrl+C to stop.");

    wait_for_shutdown().await;
    server.stop();
    Ok(())
}

fn print_response(response: &ChatResponse) {
    println!("nimbus> {}", response.response);

    if let Some(weather) = &response.weather_data {
        println!(
            "        {}, {}: {}°C (feels like {}°C), {}, humidity {}%, wind {} m/s",
            weather.city,
            weather.country,
            weather.temperature,
            weather.feels_like,
            weather.description,
            weather.humidity,
            weather.wind_speed
        );
    }

    if let Some(forecast) = &response.forecast_data {
        for day in &forecast.forecasts {
            println!(
                "        {}  {}°C .. {}°C  {}",
                day.date, day.temp_min, day.temp_max, day.description
            );
        }
    }
}

/// Interactive terminal chat over the same orchestrator the API uses
pub async fn handle_chat(config: &Config, session: &str, no_context: bool) -> Result<()> {
    let engine = EngineChat::from_config(config, &SecretManager::new()).await?;
    let chat: ChatHandle = engine.into_handle();

    println!("Nimbus weather assistant (session '{}')", session);
    println!("Commands: /history, /clear, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                let history = chat.history(session).await;
                if history.is_empty() {
                    println!("(no messages yet)");
                }
                for entry in history {
                    println!("[{}] {}", entry.role, entry.content);
                }
            }
            "/clear" => {
                chat.clear_history(session).await;
                println!("History cleared for session: {}", session);
            }
            message => match chat.submit_message(message, session, !no_context).await {
                Ok(response) => print_response(&response),
                Err(e) => println!("⚠ {} ({})", e, e.user_hint()),
            },
        }
    }

    Ok(())
}

/// Run system diagnostics
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let secrets = SecretManager::new();
    let mut issues = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration", "Valid".to_string()));
    checks.push(("LLM provider", config.llm.provider.clone()));

    match SecretManager::provider_key_var(&config.llm.provider) {
        Some(var) if secrets.has_secret(var) => checks.push(("LLM API key", "Configured".to_string())),
        Some(var) => {
            checks.push(("LLM API key", "Not configured".to_string()));
            issues.push(format!("Set {} to use the {} provider", var, config.llm.provider));
        }
        None => checks.push(("LLM API key", "Not required".to_string())),
    }

    if secrets.has_secret(OPENWEATHER_API_KEY) {
        checks.push(("OpenWeather API key", "Configured".to_string()));
    } else {
        checks.push(("OpenWeather API key", "Not configured".to_string()));
        issues.push(format!(
            "Set {} to run the weather service",
            OPENWEATHER_API_KEY
        ));
    }

    match EngineChat::from_config(config, &secrets).await {
        Ok(engine) => {
            let health = engine.into_handle().health().await;
            checks.push(("Weather service", health.weather_server.clone()));
            if health.weather_server != "healthy" {
                issues.push(format!(
                    "Weather service at {} is not reachable. Start it with 'nimbus weather-server'.",
                    config.weather.base_url
                ));
            }
            checks.push((
                "LLM provider health",
                if health.llm_configured { "OK" } else { "Unavailable" }.to_string(),
            ));
            if !health.llm_configured {
                issues.push(format!("LLM provider '{}' is not usable", config.llm.provider));
            }
            checks.push((
                "Semantic store",
                if health.vector_store.enabled {
                    format!(
                        "{} documents ({})",
                        health.vector_store.total_documents, health.vector_store.index_type
                    )
                } else {
                    "Disabled".to_string()
                },
            ));
        }
        Err(e) => {
            checks.push(("Engine", "Failed to start".to_string()));
            issues.push(format!("{} ({})", e, e.user_hint()));
        }
    }

    match format {
        OutputFormat::Text => {
            println!("Nimbus System Diagnostics");
            println!("============================");
            println!();

            println!("System Checks:");
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({ "name": name, "status": status })
                }).collect::<Vec<_>>(),
                "issues": issues,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
