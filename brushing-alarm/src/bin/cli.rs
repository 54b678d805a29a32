//! Command-line interface for the brushing alarm.
//!
//! This binary talks to the alarm daemon over its HTTP API.

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use brushing_alarm::alarm::AlarmState;
use brushing_alarm::api_client::types::{AlarmSnapshot, ErrorKind};
use brushing_alarm::api_client::{self, ClientError};
use brushing_alarm::camera::{FilePhotoSource, PhotoSource};
use brushing_alarm::clock::parse_target_time;

const ENV_API_URL: &str = "BRUSHING_ALARM_API_URL";

fn usage() {
    eprintln!("Usage: brushing-alarm-cli <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status            Show alarm state");
    eprintln!("  set <TIME>        Arm the alarm (HH:MM, +SECONDS or RFC 3339)");
    eprintln!("  cancel            Cancel the armed alarm");
    eprintln!("  dismiss <PHOTO>   Silence the ringing alarm with a toothbrush photo");
    eprintln!();
    eprintln!("Environment:");
    eprintln!(
        "  {ENV_API_URL}    API base URL (default: {})",
        api_client::DEFAULT_BASE_URL
    );
}

enum Command {
    Status,
    Set(OffsetDateTime),
    Cancel,
    Dismiss(String),
}

fn main() -> Result<ExitCode> {
    // Local offsets can only be read soundly while single-threaded, so
    // everything that needs one happens before the runtime starts.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        usage();
        return Ok(ExitCode::FAILURE);
    }

    let command = match (args[0].as_str(), args.get(1), args.len()) {
        ("status", None, 1) => Command::Status,
        ("set", Some(time), 2) => {
            let now = OffsetDateTime::now_utc().to_offset(offset);
            let target = parse_target_time(time, now, |at| {
                UtcOffset::local_offset_at(at).unwrap_or(offset)
            })?;
            Command::Set(target)
        }
        ("cancel", None, 1) => Command::Cancel,
        ("dismiss", Some(photo), 2) => Command::Dismiss(photo.clone()),
        _ => {
            eprintln!("Unknown command or wrong arguments: {}", args.join(" "));
            eprintln!("Run without arguments to see usage.");
            return Ok(ExitCode::FAILURE);
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let client = make_client();

    let result = runtime.block_on(async {
        match command {
            Command::Status => cmd_status(&client, offset).await,
            Command::Set(target) => cmd_set(&client, target, offset).await,
            Command::Cancel => cmd_cancel(&client).await,
            Command::Dismiss(photo) => cmd_dismiss(&client, &photo).await,
        }
    });

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<ClientError>() {
            Some(client_error) => {
                eprintln!("{}", describe(client_error));
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}

/// Build an API client, honoring BRUSHING_ALARM_API_URL if set.
fn make_client() -> api_client::Client {
    match env::var(ENV_API_URL) {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

/// Turn an API failure into something a half-awake person can act on.
fn describe(err: &ClientError) -> String {
    match err.kind() {
        Some(ErrorKind::InvalidTime) => format!("That time is not in the future ({err})."),
        Some(ErrorKind::InvalidState) => format!("Not now: {err}."),
        Some(ErrorKind::VerificationFailed) => {
            "No toothbrush in that photo. The alarm keeps ringing.".to_string()
        }
        Some(ErrorKind::VerificationService) => {
            format!("Could not check the photo ({err}). The alarm keeps ringing; try again.")
        }
        Some(ErrorKind::Playback) => format!("Sound problem: {err}."),
        Some(ErrorKind::InvalidRequest) | Some(ErrorKind::Unavailable) | None => err.to_string(),
    }
}

fn format_time(at: OffsetDateTime, offset: UtcOffset) -> String {
    at.to_offset(offset)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| at.to_string())
}

fn print_snapshot(snapshot: &AlarmSnapshot, offset: UtcOffset) {
    println!("State:   {}", snapshot.state);
    if let Some(at) = snapshot.target_time {
        println!("Target:  {}", format_time(at, offset));
    }
    if let Some(at) = snapshot.fired_at {
        println!("Fired:   {}", format_time(at, offset));
    }
    match snapshot.last_verification {
        Some(true) => println!("Last photo: toothbrush"),
        Some(false) => println!("Last photo: no toothbrush"),
        None => {}
    }
}

async fn cmd_status(client: &api_client::Client, offset: UtcOffset) -> Result<()> {
    let snapshot = client.get_alarm().await?;
    print_snapshot(&snapshot, offset);
    Ok(())
}

async fn cmd_set(
    client: &api_client::Client,
    target: OffsetDateTime,
    offset: UtcOffset,
) -> Result<()> {
    let snapshot = client.schedule(target).await?;
    println!("Alarm set for {}", format_time(target, target.offset()));
    print_snapshot(&snapshot, offset);
    Ok(())
}

async fn cmd_cancel(client: &api_client::Client) -> Result<()> {
    client.cancel().await?;
    println!("Alarm cancelled");
    Ok(())
}

async fn cmd_dismiss(client: &api_client::Client, photo: &str) -> Result<()> {
    let Some(photo) = FilePhotoSource::new(photo)
        .capture()
        .await
        .context("failed to capture photo")?
    else {
        println!("No photo taken. The alarm keeps ringing.");
        return Ok(());
    };

    if client.get_alarm().await?.state == AlarmState::Ringing {
        client.request_dismissal().await?;
    }

    client.submit_photo(photo).await?;
    println!("Toothbrush verified. Good morning!");
    Ok(())
}
