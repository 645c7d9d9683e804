//! Intent records and their JSON-backed store.
//!
//! The store is the chatbot's entire knowledge: one flat ordered list of
//! [`Intent`] records, persisted verbatim as `{"intents": [...]}` and
//! rewritten wholesale after every teach event. There is no schema
//! versioning; duplicate tags and empty pattern lists are accepted as-is.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A labeled group of example phrases and candidate replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Unique-ish label for this group. Taught intents get a synthetic
    /// `learned_NNNN` tag.
    pub tag: String,
    /// Training examples mapped to this tag.
    pub patterns: Vec<String>,
    /// Candidate replies, sampled uniformly at reply time.
    pub responses: Vec<String>,
}

/// On-disk document shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IntentFile {
    intents: Vec<Intent>,
}

/// JSON-file-backed intent store.
#[derive(Debug)]
pub struct IntentStore {
    path: PathBuf,
    intents: Vec<Intent>,
}

impl IntentStore {
    /// Load the intent file, seeding it with a starter set if it does not
    /// exist yet.
    pub fn load_or_seed(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            let store = Self {
                path: path.clone(),
                intents: seed_intents(),
            };
            store.save()?;
            info!(path = %path.display(), "seeded new intent file");
            return Ok(store);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read intent file {}", path.display()))?;
        let file: IntentFile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse intent file {}", path.display()))?;

        Ok(Self {
            path,
            intents: file.intents,
        })
    }

    /// All intents, in file order.
    #[must_use]
    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    /// Number of intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether the store holds no intents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Look up an intent by tag. First match wins when tags collide.
    #[must_use]
    pub fn find(&self, tag: &str) -> Option<&Intent> {
        self.intents.iter().find(|i| i.tag == tag)
    }

    /// Pick a random canned response for a tag.
    #[must_use]
    pub fn response_for(&self, tag: &str) -> Option<String> {
        let intent = self.find(tag)?;
        intent
            .responses
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    /// Append a new intent and rewrite the whole file.
    pub fn append(&mut self, intent: Intent) -> Result<()> {
        self.intents.push(intent);
        if let Err(e) = self.save() {
            // Keep memory and disk consistent on failure.
            self.intents.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Rewrite the backing file. Writes to a temp sibling and renames so a
    /// crash mid-write never leaves a truncated document.
    pub fn save(&self) -> Result<()> {
        let file = IntentFile {
            intents: self.intents.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("failed to serialize intents")?;

        let tmp = tmp_sibling(&self.path);
        fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Synthetic tag for a taught intent.
#[must_use]
pub fn learned_tag() -> String {
    format!("learned_{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// Starter knowledge written when no intent file exists.
fn seed_intents() -> Vec<Intent> {
    vec![
        Intent {
            tag: "greeting".to_string(),
            patterns: vec![
                "hello".to_string(),
                "hi".to_string(),
                "hey there".to_string(),
                "good morning".to_string(),
            ],
            responses: vec![
                "Hello! How can I help?".to_string(),
                "Hi, welcome back!".to_string(),
            ],
        },
        Intent {
            tag: "how_are_you".to_string(),
            patterns: vec![
                "how are you".to_string(),
                "how is it going".to_string(),
                "hows it going".to_string(),
            ],
            responses: vec![
                "I'm software, so no feelings, but all my systems are running great!".to_string(),
            ],
        },
        Intent {
            tag: "farewell".to_string(),
            patterns: vec![
                "bye".to_string(),
                "goodbye".to_string(),
                "see you later".to_string(),
            ],
            responses: vec!["Bye!".to_string(), "See you around!".to_string()],
        },
        Intent {
            tag: "thanks".to_string(),
            patterns: vec!["thanks".to_string(), "thank you".to_string()],
            responses: vec!["Any time!".to_string(), "Happy to help!".to_string()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn seeds_file_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.json");

        let store = IntentStore::load_or_seed(&path).unwrap();
        assert!(!store.is_empty());
        assert!(path.exists());

        // Reload parses what was written.
        let reloaded = IntentStore::load_or_seed(&path).unwrap();
        assert_eq!(reloaded.len(), store.len());
    }

    #[test]
    fn append_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.json");

        let mut store = IntentStore::load_or_seed(&path).unwrap();
        let before = store.len();

        store
            .append(Intent {
                tag: "learned_0001".to_string(),
                patterns: vec!["what is rust".to_string()],
                responses: vec!["A systems programming language.".to_string()],
            })
            .unwrap();

        let reloaded = IntentStore::load_or_seed(&path).unwrap();
        assert_eq!(reloaded.len(), before + 1);
        let intent = reloaded.find("learned_0001").unwrap();
        assert_eq!(intent.patterns, vec!["what is rust"]);
    }

    #[test]
    fn response_for_samples_from_the_tag() {
        let dir = TempDir::new().unwrap();
        let store = IntentStore::load_or_seed(dir.path().join("intents.json")).unwrap();

        let greeting = store.find("greeting").unwrap().responses.clone();
        for _ in 0..10 {
            let reply = store.response_for("greeting").unwrap();
            assert!(greeting.contains(&reply));
        }
        assert!(store.response_for("no_such_tag").is_none());
    }

    #[test]
    fn bad_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(IntentStore::load_or_seed(&path).is_err());
    }

    #[test]
    fn learned_tags_have_the_expected_shape() {
        let tag = learned_tag();
        assert!(tag.starts_with("learned_"));
        assert_eq!(tag.len(), "learned_".len() + 4);
    }
}
