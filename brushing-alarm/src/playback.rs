//! Alarm sound playback.
//!
//! Audio decoding is left to an external player program. [`SoundPlayer`]
//! runs it over and over until told to stop, so a short clip becomes a
//! continuous alarm.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::tracing::prelude::*;

/// Pause between the end of one play-through and the start of the next.
const REPLAY_GAP: Duration = Duration::from_millis(500);

/// Failures of the sound and notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("failed to start player {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wake timer unavailable: {0}")]
    Timer(String),
}

/// Something that can make the alarm audible.
///
/// Both operations are idempotent: starting a playing player or stopping
/// a silent one succeeds without doing anything.
pub trait Player: Send {
    fn start(&mut self) -> Result<(), PlaybackError>;
    fn stop(&mut self) -> Result<(), PlaybackError>;
    fn is_playing(&self) -> bool;
}

/// Plays a sound file by repeatedly running an external player.
#[derive(Debug)]
pub struct SoundPlayer {
    program: String,
    sound: Option<PathBuf>,
    playing: Option<CancellationToken>,
}

impl SoundPlayer {
    pub fn new(program: impl Into<String>, sound: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            sound,
            playing: None,
        }
    }

    fn spawn(program: &str, sound: Option<&PathBuf>) -> std::io::Result<Child> {
        let mut command = Command::new(program);
        if let Some(sound) = sound {
            command.arg(sound);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }
}

impl Player for SoundPlayer {
    fn start(&mut self) -> Result<(), PlaybackError> {
        if self.playing.is_some() {
            return Ok(());
        }

        // The first spawn happens here so a missing player is reported to
        // the caller instead of only showing up in the log.
        let child =
            Self::spawn(&self.program, self.sound.as_ref()).map_err(|source| {
                PlaybackError::Spawn {
                    program: self.program.clone(),
                    source,
                }
            })?;

        let token = CancellationToken::new();
        tokio::spawn(play_loop(
            child,
            self.program.clone(),
            self.sound.clone(),
            token.clone(),
        ));
        self.playing = Some(token);

        debug!(program = %self.program, sound = ?self.sound, "Playback started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        if let Some(token) = self.playing.take() {
            token.cancel();
            debug!("Playback stopped");
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.is_some()
    }
}

impl Drop for SoundPlayer {
    fn drop(&mut self) {
        if let Some(token) = self.playing.take() {
            token.cancel();
        }
    }
}

async fn play_loop(
    mut child: Child,
    program: String,
    sound: Option<PathBuf>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Player already exited");
                }
                return;
            }
            status = child.wait() => {
                match status {
                    Ok(status) if !status.success() => {
                        warn!(program = %program, %status, "Player exited with failure");
                    }
                    Err(e) => warn!(program = %program, error = %e, "Failed to wait for player"),
                    Ok(_) => {}
                }
            }
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(REPLAY_GAP) => {}
        }

        child = match SoundPlayer::spawn(&program, sound.as_ref()) {
            Ok(child) => child,
            Err(e) => {
                error!(program = %program, error = %e, "Failed to restart player");
                return;
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let mut player = SoundPlayer::new("/nonexistent/brushing-alarm-player", None);

        let err = player.start().unwrap_err();
        assert!(matches!(err, PlaybackError::Spawn { .. }));
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn start_and_stop_toggle_playing() {
        let mut player = SoundPlayer::new("true", None);

        player.start().unwrap();
        assert!(player.is_playing());

        // Starting again is a no-op
        player.start().unwrap();
        assert!(player.is_playing());

        player.stop().unwrap();
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn stop_when_silent_is_noop() {
        let mut player = SoundPlayer::new("true", None);
        player.stop().unwrap();
        assert!(!player.is_playing());
    }
}
