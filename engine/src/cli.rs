//! CLI interface for Nimbus
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for running the weather assistant.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nimbus Weather Assistant
///
/// A conversational weather assistant that answers questions about current
/// conditions and forecasts, backed by an LLM provider and OpenWeather.
#[derive(Parser, Debug)]
#[command(name = "nimbus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat HTTP API
    Serve {
        /// Also run the weather service in this process
        #[arg(long)]
        with_weather_server: bool,
    },

    /// Run only the weather service
    WeatherServer,

    /// Chat with the assistant in the terminal
    Chat {
        /// Conversation session to use
        #[arg(short, long, default_value = "default")]
        session: String,

        /// Do not look up similar past queries
        #[arg(long)]
        no_context: bool,
    },

    /// Check the LLM provider, weather service and semantic store
    Doctor,
}
