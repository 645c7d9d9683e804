//! The chat engine: intent matching plus the teach-me flow.
//!
//! One behavioral unit with two states per client, tracked on the session:
//!
//! - `Normal` → `AwaitingTeach` when nothing scores above the confidence
//!   threshold; the unanswered question is parked on the session.
//! - `AwaitingTeach` → `Normal` on a cancellation phrase, or after the
//!   answer is persisted as a new intent and the classifier is retrained
//!   from scratch.
//!
//! The store and the classifier live behind one `RwLock` so a teach-time
//! retrain can never race a concurrent classification.

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::calc;
use crate::classifier::IntentClassifier;
use crate::intents::{learned_tag, Intent, IntentStore};
use crate::session::{Session, TeachState};
use crate::text::normalize;

/// Phrases that abandon a pending teach, compared after normalization.
const CANCEL_PHRASES: &[&str] = &["no", "cancel", "nevermind", "never mind", "forget it"];

/// Reply asking the user to teach the bot.
const TEACH_PROMPT: &str =
    "I don't know that one yet. Teach me what to answer? (Or say 'no' to skip.)";

/// What the engine says back, and whether the client is now in teach mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub teach_mode: bool,
}

impl Reply {
    fn normal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            teach_mode: false,
        }
    }
}

/// Store and classifier, locked together.
#[derive(Debug)]
struct Brain {
    store: IntentStore,
    classifier: IntentClassifier,
}

/// Shared chat engine.
#[derive(Debug)]
pub struct ChatEngine {
    confidence_threshold: f32,
    brain: RwLock<Brain>,
}

impl ChatEngine {
    /// Build an engine over a loaded store and train the classifier.
    #[must_use]
    pub fn new(store: IntentStore, confidence_threshold: f32) -> Self {
        let mut classifier = IntentClassifier::new();
        classifier.train(store.intents());
        info!(
            intents = store.len(),
            patterns = classifier.pattern_count(),
            "classifier trained"
        );

        Self {
            confidence_threshold,
            brain: RwLock::new(Brain { store, classifier }),
        }
    }

    /// Produce a reply for one message from one client.
    ///
    /// Engine-level failures (unparseable arithmetic, unknown intents,
    /// even a failed persist) all resolve to a reply; nothing here maps
    /// to an HTTP error.
    pub async fn respond(&self, session: &Session, message: &str) -> Reply {
        let trimmed = message.trim();

        // A pending teach consumes the message before anything else. A
        // blank message neither answers nor cancels, so the session stays
        // in teach mode and the reply must say so.
        if let TeachState::AwaitingTeach { question } = session.teach_state() {
            if trimmed.is_empty() {
                return Reply {
                    text: "Still listening — teach me the answer, or say 'no' to skip."
                        .to_string(),
                    teach_mode: true,
                };
            }
            return self.finish_teach(session, &question, trimmed).await;
        }

        if trimmed.is_empty() {
            return Reply::normal("Say something and I'll do my best.");
        }

        // Arithmetic bypasses the classifier entirely.
        if let Some(value) = calc::try_evaluate(trimmed) {
            debug!(message = %trimmed, value, "arithmetic short-circuit");
            return Reply::normal(format!(
                "That comes out to {}.",
                calc::format_result(value)
            ));
        }

        {
            let brain = self.brain.read().await;
            if let Some(prediction) = brain.classifier.classify(trimmed) {
                debug!(tag = %prediction.tag, score = prediction.score, "classified");
                if prediction.score > self.confidence_threshold {
                    if let Some(response) = brain.store.response_for(&prediction.tag) {
                        return Reply::normal(response);
                    }
                }
            }
        }

        // Nothing confident enough: ask to be taught.
        session.set_teach_state(TeachState::AwaitingTeach {
            question: normalize(trimmed),
        });
        Reply {
            text: TEACH_PROMPT.to_string(),
            teach_mode: true,
        }
    }

    /// Handle the message that answers a pending teach prompt.
    async fn finish_teach(&self, session: &Session, question: &str, answer: &str) -> Reply {
        if CANCEL_PHRASES.contains(&normalize(answer).as_str()) {
            session.set_teach_state(TeachState::Normal);
            return Reply::normal("Okay, forget it. What else can I help with?");
        }

        let mut brain = self.brain.write().await;
        let tag = learned_tag();
        let intent = Intent {
            tag: tag.clone(),
            patterns: vec![question.to_string()],
            responses: vec![answer.to_string()],
        };

        match brain.store.append(intent) {
            Ok(()) => {
                let Brain { store, classifier } = &mut *brain;
                classifier.train(store.intents());
                drop(brain);

                session.set_teach_state(TeachState::Normal);
                info!(tag = %tag, question = %question, "learned new intent");
                Reply::normal(format!(
                    "Thanks! When someone asks \"{question}\" I'll answer \"{answer}\"."
                ))
            }
            Err(error) => {
                drop(brain);
                session.set_teach_state(TeachState::Normal);
                warn!(error = %error, "failed to persist taught intent");
                Reply::normal(
                    "I couldn't write that down just now, so I'll have to ask again later.",
                )
            }
        }
    }

    /// Snapshot of the current intent list, for the inspection API.
    pub async fn intents(&self) -> Vec<Intent> {
        self.brain.read().await.store.intents().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> ChatEngine {
        let store = IntentStore::load_or_seed(dir.path().join("intents.json")).unwrap();
        ChatEngine::new(store, 0.6)
    }

    #[tokio::test]
    async fn known_intent_gets_a_canned_reply() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let session = SessionStore::new().create();

        let reply = engine.respond(&session, "hello").await;
        assert!(!reply.teach_mode);
        assert!(!reply.text.is_empty());
        assert_eq!(session.teach_state(), TeachState::Normal);
    }

    #[tokio::test]
    async fn arithmetic_short_circuits() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let session = SessionStore::new().create();

        let reply = engine.respond(&session, "2+2").await;
        assert!(!reply.teach_mode);
        assert!(reply.text.contains('4'));
    }

    #[tokio::test]
    async fn unknown_message_enters_teach_mode() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let session = SessionStore::new().create();

        let reply = engine
            .respond(&session, "what is the capital of assyria")
            .await;
        assert!(reply.teach_mode);
        assert!(matches!(
            session.teach_state(),
            TeachState::AwaitingTeach { .. }
        ));
    }

    #[tokio::test]
    async fn teach_then_reask_returns_the_taught_answer() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let session = SessionStore::new().create();

        let ask = engine.respond(&session, "what is the answer?").await;
        assert!(ask.teach_mode);

        let taught = engine.respond(&session, "Forty-two.").await;
        assert!(!taught.teach_mode);
        assert!(taught.text.contains("Thanks"));
        assert_eq!(session.teach_state(), TeachState::Normal);

        // Same question again, even with different punctuation.
        let reply = engine.respond(&session, "What is the ANSWER").await;
        assert!(!reply.teach_mode);
        assert_eq!(reply.text, "Forty-two.");
    }

    #[tokio::test]
    async fn taught_intent_is_persisted_to_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.json");
        let store = IntentStore::load_or_seed(&path).unwrap();
        let engine = ChatEngine::new(store, 0.6);
        let session = SessionStore::new().create();

        let _ = engine.respond(&session, "who wrote dune").await;
        let _ = engine.respond(&session, "Frank Herbert").await;

        let reloaded = IntentStore::load_or_seed(&path).unwrap();
        let learned = reloaded
            .intents()
            .iter()
            .find(|i| i.tag.starts_with("learned_"))
            .expect("taught intent on disk");
        assert_eq!(learned.patterns, vec!["who wrote dune"]);
        assert_eq!(learned.responses, vec!["Frank Herbert"]);
    }

    #[tokio::test]
    async fn cancellation_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.json");
        let store = IntentStore::load_or_seed(&path).unwrap();
        let before = store.len();
        let engine = ChatEngine::new(store, 0.6);
        let session = SessionStore::new().create();

        let _ = engine.respond(&session, "zorble florp").await;
        let reply = engine.respond(&session, "no").await;
        assert!(!reply.teach_mode);
        assert_eq!(session.teach_state(), TeachState::Normal);

        let reloaded = IntentStore::load_or_seed(&path).unwrap();
        assert_eq!(reloaded.len(), before);
    }

    #[tokio::test]
    async fn teach_states_are_per_session() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let sessions = SessionStore::new();
        let a = sessions.create();
        let b = sessions.create();

        let _ = engine.respond(&a, "gibberish nobody knows").await;
        assert!(matches!(a.teach_state(), TeachState::AwaitingTeach { .. }));

        // Session b is unaffected and still classifies normally.
        let reply = engine.respond(&b, "hello").await;
        assert!(!reply.teach_mode);
        assert_eq!(b.teach_state(), TeachState::Normal);
    }

    #[tokio::test]
    async fn blank_message_while_awaiting_keeps_teach_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.json");
        let store = IntentStore::load_or_seed(&path).unwrap();
        let before = store.len();
        let engine = ChatEngine::new(store, 0.6);
        let session = SessionStore::new().create();

        let prompt = engine.respond(&session, "zorble florp").await;
        assert!(prompt.teach_mode);

        // A blank message neither answers nor cancels; the reported flag
        // must match the session, which is still awaiting an answer.
        let blank = engine.respond(&session, "   ").await;
        assert!(blank.teach_mode);
        assert!(matches!(
            session.teach_state(),
            TeachState::AwaitingTeach { .. }
        ));

        // A known greeting afterwards is the taught answer, not a match,
        // so nothing about the blank message leaked state.
        let taught = engine.respond(&session, "hello").await;
        assert!(!taught.teach_mode);
        assert!(taught.text.contains("Thanks"));

        let reloaded = IntentStore::load_or_seed(&path).unwrap();
        assert_eq!(reloaded.len(), before + 1);
    }

    #[tokio::test]
    async fn blank_message_is_a_fixed_reply() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let session = SessionStore::new().create();

        let reply = engine.respond(&session, "   ").await;
        assert!(!reply.teach_mode);
        assert_eq!(session.teach_state(), TeachState::Normal);
    }
}
