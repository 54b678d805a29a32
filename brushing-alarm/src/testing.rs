//! Test doubles shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::playback::{PlaybackError, Player};
use crate::verifier::{ImageVerifier, VerifierError};

/// Player whose state is visible through clones.
#[derive(Clone, Default)]
pub struct SharedPlayer {
    playing: Arc<AtomicBool>,
}

impl SharedPlayer {
    pub fn playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl Player for SharedPlayer {
    fn start(&mut self) -> Result<(), PlaybackError> {
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing()
    }
}

#[derive(Clone, Copy)]
enum Answer {
    Verdict(bool),
    Unavailable,
    Hang,
}

/// Verifier that always gives the same answer and counts calls.
#[derive(Clone)]
pub struct FixedVerifier {
    answer: Answer,
    calls: Arc<AtomicUsize>,
}

impl FixedVerifier {
    pub fn accepting() -> Self {
        Self::answering(Answer::Verdict(true))
    }

    pub fn rejecting() -> Self {
        Self::answering(Answer::Verdict(false))
    }

    /// A verifier whose service is unreachable.
    pub fn failing() -> Self {
        Self::answering(Answer::Unavailable)
    }

    /// A verifier that never answers.
    pub fn hanging() -> Self {
        Self::answering(Answer::Hang)
    }

    fn answering(answer: Answer) -> Self {
        Self {
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageVerifier for FixedVerifier {
    async fn verify(&self, _image: &[u8]) -> Result<bool, VerifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Answer::Verdict(verdict) => Ok(verdict),
            Answer::Unavailable => Err(VerifierError::Status {
                status: 503,
                body: "service unavailable".into(),
            }),
            Answer::Hang => std::future::pending().await,
        }
    }
}
