//! Cheddar Command-Line Interface
//!
//! A scriptable client for the Cheddar background service: session control,
//! payload relay, system-audio capture, local transcription, and a live
//! event follower.

mod client;
mod colors;
mod commands;
mod exit_codes;

use clap::{Parser, Subcommand};
use exit_codes::ExitCode;

/// Cheddar - desktop assistant CLI
#[derive(Parser, Debug)]
#[command(name = "cheddar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the realtime assistant session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Relay a payload to the active session
    Send {
        #[command(subcommand)]
        payload: SendPayload,
    },
    /// Control system-audio capture
    Audio {
        #[command(subcommand)]
        action: AudioAction,
    },
    /// Transcribe a recorded audio file with the local model
    Transcribe {
        /// Audio container file (webm, ogg, wav, m4a, mp3)
        file: std::path::PathBuf,
    },
    /// Export a transcript file into the Cheddar data directory
    Export {
        /// Text file to export
        file: std::path::PathBuf,
    },
    /// Show current session/capture status
    Status,
    /// Follow status and response events
    Watch,
    /// Check that the service is running
    Ping,
    /// Shut the service down
    Quit,
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// Open a realtime session
    Start {
        /// API key for the realtime service
        #[arg(long)]
        api_key: String,

        /// Conversation profile (interview, sales, meeting, ...)
        #[arg(long)]
        profile: Option<String>,

        /// Spoken-language tag (e.g. en-US)
        #[arg(long)]
        language: Option<String>,

        /// Extra prompt text appended to the profile prompt
        #[arg(long, default_value = "")]
        prompt: String,
    },
    /// Close the active session
    Close,
}

#[derive(Subcommand, Debug)]
enum SendPayload {
    /// Send a text message
    Text {
        /// The message
        message: String,
    },
    /// Send an image frame (JPEG file)
    Image {
        /// Image file to send
        file: std::path::PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum AudioAction {
    /// Start system-audio capture
    Start,
    /// Stop system-audio capture
    Stop,
}

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{}", colors::error(&message));
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let output = commands::Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Session { action } => match action {
            SessionAction::Start {
                api_key,
                profile,
                language,
                prompt,
            } => commands::session_start(&output, api_key, profile, language, prompt),
            SessionAction::Close => commands::session_close(&output),
        },
        Commands::Send { payload } => match payload {
            SendPayload::Text { message } => commands::send_text(&output, message),
            SendPayload::Image { file } => commands::send_image(&output, &file),
        },
        Commands::Audio { action } => match action {
            AudioAction::Start => commands::audio_start(&output),
            AudioAction::Stop => commands::audio_stop(&output),
        },
        Commands::Transcribe { file } => commands::transcribe(&output, &file),
        Commands::Export { file } => commands::export(&output, &file),
        Commands::Status => commands::status(&output),
        Commands::Watch => commands::watch(&output),
        Commands::Ping => commands::ping(&output),
        Commands::Quit => commands::quit(&output),
    }
}
