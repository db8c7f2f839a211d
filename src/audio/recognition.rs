// recognition.rs — Single-shot speech-to-text session.
//
// The host supplies the actual recognizer; this module wraps it in an
// explicit IDLE ⇄ LISTENING state machine with a completion channel, so the
// orchestrator never deals with ambient callback events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::PipelineError;

/// Host-supplied single-utterance speech-to-text engine.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Listen for one utterance and return the finalized transcript.
    /// Resolves once per call; never a continuous stream.
    async fn listen_once(&self) -> Result<String, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionState {
    Idle,
    Listening,
}

/// Receiver side of one listening session. Yields exactly one item — the
/// transcript or a failure — or closes without an item when the session was
/// stopped before a transcript was finalized.
pub type TranscriptRx = mpsc::Receiver<Result<String, PipelineError>>;

/// Two-state recognition session over a [`SpeechRecognizer`].
pub struct RecognitionSession {
    recognizer: Arc<dyn SpeechRecognizer>,
    listening: Arc<AtomicBool>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl RecognitionSession {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            listening: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RecognitionState {
        if self.listening.load(Ordering::SeqCst) {
            RecognitionState::Listening
        } else {
            RecognitionState::Idle
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Transition IDLE → LISTENING and return the completion channel.
    /// Starting while already listening fails with [`PipelineError::Busy`];
    /// the request is dropped, never queued.
    pub fn start(&self) -> Result<TranscriptRx, PipelineError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::Busy);
        }

        let (done_tx, done_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.cancel.lock().unwrap() = Some(cancel_tx);

        let recognizer = Arc::clone(&self.recognizer);
        let listening = Arc::clone(&self.listening);

        tokio::spawn(async move {
            tokio::select! {
                result = recognizer.listen_once() => {
                    let _ = done_tx.send(result).await;
                }
                _ = cancel_rx => {
                    log::info!("Recognition stopped before a transcript was finalized");
                }
            }
            listening.store(false, Ordering::SeqCst);
        });

        Ok(done_rx)
    }

    /// Explicit stop: transition out of LISTENING without emitting a
    /// transcript. The completion channel closes empty.
    pub fn stop(&self) {
        if let Some(tx) = self.cancel.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    /// Recognizer that waits until the test releases it, then returns the
    /// configured result.
    struct GatedRecognizer {
        gate: Notify,
        result: Mutex<Option<Result<String, PipelineError>>>,
    }

    impl GatedRecognizer {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                result: Mutex::new(Some(Ok(text.to_string()))),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                result: Mutex::new(Some(Err(PipelineError::Device("mic denied".into())))),
            })
        }
    }

    #[async_trait]
    impl SpeechRecognizer for GatedRecognizer {
        async fn listen_once(&self) -> Result<String, PipelineError> {
            self.gate.notified().await;
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(PipelineError::Busy))
        }
    }

    #[tokio::test]
    async fn delivers_one_transcript_then_returns_to_idle() {
        let recognizer = GatedRecognizer::ok("switch to thermal view");
        let session = RecognitionSession::new(recognizer.clone());

        let mut rx = session.start().unwrap();
        assert_eq!(session.state(), RecognitionState::Listening);

        recognizer.gate.notify_one();
        let transcript = rx.recv().await.unwrap().unwrap();
        assert_eq!(transcript, "switch to thermal view");

        // Channel yields exactly one item.
        assert!(rx.recv().await.is_none());
        assert_eq!(session.state(), RecognitionState::Idle);
    }

    #[tokio::test]
    async fn starting_while_listening_is_rejected() {
        let recognizer = GatedRecognizer::ok("ignored");
        let session = RecognitionSession::new(recognizer.clone());

        let _rx = session.start().unwrap();
        assert!(matches!(session.start(), Err(PipelineError::Busy)));

        recognizer.gate.notify_one();
    }

    #[tokio::test]
    async fn stop_closes_channel_without_transcript() {
        let recognizer = GatedRecognizer::ok("never delivered");
        let session = RecognitionSession::new(recognizer);

        let mut rx = session.start().unwrap();
        session.stop();

        assert!(rx.recv().await.is_none());
        // The spawned task has observed the cancel by the time recv returns.
        assert_eq!(session.state(), RecognitionState::Idle);
    }

    #[tokio::test]
    async fn recognizer_failure_is_delivered_on_the_channel() {
        let recognizer = GatedRecognizer::failing();
        let session = RecognitionSession::new(recognizer.clone());

        let mut rx = session.start().unwrap();
        recognizer.gate.notify_one();

        let result = rx.recv().await.unwrap();
        assert!(matches!(result, Err(PipelineError::Device(_))));
        assert_eq!(session.state(), RecognitionState::Idle);
    }

    #[tokio::test]
    async fn session_is_reusable_after_completion() {
        let recognizer = GatedRecognizer::ok("first");
        let session = RecognitionSession::new(recognizer.clone());

        let mut rx = session.start().unwrap();
        recognizer.gate.notify_one();
        rx.recv().await.unwrap().unwrap();
        assert!(rx.recv().await.is_none());

        *recognizer.result.lock().unwrap() = Some(Ok("second".into()));
        let mut rx = session.start().unwrap();
        recognizer.gate.notify_one();
        assert_eq!(rx.recv().await.unwrap().unwrap(), "second");
    }
}
