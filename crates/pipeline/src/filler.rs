//! Filler clips
//!
//! Short acknowledgements ("Mm-hmm.", "Okay.") rendered once at start-up and played while
//! the real reply is generated. Two selection policies:
//!
//! - rotation: random pick that never repeats the previous clip back-to-back
//! - content-aware: ordered rules over the agent's last utterance, falling back to rotation
//!   when the chosen text has no rendered clip

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use voicebot_config::constants::fillers;
use voicebot_core::{AudioRef, Synthesizer};

/// A pre-rendered acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillerClip {
    pub text: String,
    pub audio: AudioRef,
}

/// Immutable set of filler clips, shared by every call
#[derive(Debug, Default)]
pub struct FillerLibrary {
    clips: Vec<FillerClip>,
}

impl FillerLibrary {
    pub fn new(clips: Vec<FillerClip>) -> Self {
        Self { clips }
    }

    /// Render every distinct text with `synthesizer`.
    ///
    /// Texts that fail to render are skipped; the library may end up smaller than `texts`
    /// or empty.
    pub async fn build(synthesizer: &dyn Synthesizer, texts: &[String]) -> Self {
        let mut seen = HashSet::new();
        let mut clips = Vec::with_capacity(texts.len());

        for text in texts {
            let text = text.trim();
            if text.is_empty() || !seen.insert(text.to_string()) {
                continue;
            }

            match synthesizer.synthesize(text).await {
                Ok(audio) => clips.push(FillerClip {
                    text: text.to_string(),
                    audio,
                }),
                Err(e) => tracing::warn!(filler = text, error = %e, "Failed to pre-render filler"),
            }
        }

        tracing::info!(
            clips = clips.len(),
            requested = texts.len(),
            model = synthesizer.model_name(),
            "Filler library ready"
        );

        Self { clips }
    }

    pub fn clips(&self) -> &[FillerClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Index of the clip rendered from `text`
    pub fn position(&self, text: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.text == text)
    }
}

/// What a content rule asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillerChoice {
    Text(&'static str),
    /// Random clip from [`fillers::NEUTRAL`]
    Neutral,
}

struct FillerRule {
    name: &'static str,
    matches: fn(text: &str, turn: u32) -> bool,
    choice: FillerChoice,
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Evaluated top to bottom against the lower-cased utterance; first match wins.
const CONTENT_RULES: &[FillerRule] = &[
    FillerRule {
        name: "spelling",
        matches: |text, _| text.contains("spell"),
        choice: FillerChoice::Text(fillers::OKAY),
    },
    FillerRule {
        name: "date_of_birth",
        matches: |text, _| contains_any(text, &["date of birth", "birthday", "dob"]),
        choice: FillerChoice::Text(fillers::MM_HMM),
    },
    FillerRule {
        name: "confirmation",
        matches: |text, _| {
            contains_any(
                text,
                &[
                    "is that correct",
                    "is that right",
                    "can you confirm",
                    "did i get that",
                ],
            )
        },
        choice: FillerChoice::Text(fillers::YES),
    },
    FillerRule {
        name: "early_turn",
        matches: |_, turn| turn <= 1,
        choice: FillerChoice::Neutral,
    },
];

/// Chooses which filler to play. One instance per process.
pub struct FillerSelector {
    library: Arc<FillerLibrary>,
    last_played: Mutex<Option<usize>>,
}

impl FillerSelector {
    pub fn new(library: Arc<FillerLibrary>) -> Self {
        Self {
            library,
            last_played: Mutex::new(None),
        }
    }

    pub fn library(&self) -> &FillerLibrary {
        &self.library
    }

    /// Random clip other than the one played last. `None` when the library is empty.
    pub fn rotate(&self) -> Option<FillerClip> {
        let count = self.library.len();
        if count == 0 {
            return None;
        }

        let mut last = self.last_played.lock();
        let index = match *last {
            Some(prev) if count > 1 && prev < count => {
                // Draw from the other count-1 slots and skip over `prev`
                let pick = rand::thread_rng().gen_range(0..count - 1);
                if pick >= prev {
                    pick + 1
                } else {
                    pick
                }
            }
            _ => rand::thread_rng().gen_range(0..count),
        };
        *last = Some(index);

        Some(self.library.clips[index].clone())
    }

    /// Clip suited to what the agent just said at turn `turn`
    pub fn select_for(&self, agent_text: &str, turn: u32) -> Option<FillerClip> {
        let text = agent_text.to_lowercase();

        let (rule, wanted) = CONTENT_RULES
            .iter()
            .find(|rule| (rule.matches)(&text, turn))
            .map(|rule| (rule.name, rule.choice))
            .unwrap_or(("unclassified", FillerChoice::Neutral));

        let wanted = match wanted {
            FillerChoice::Text(t) => Some(t),
            FillerChoice::Neutral => self.pick_neutral(),
        };

        if let Some(index) = wanted.and_then(|t| self.library.position(t)) {
            *self.last_played.lock() = Some(index);
            let clip = self.library.clips[index].clone();
            tracing::debug!(rule, filler = %clip.text, "Content-aware filler");
            return Some(clip);
        }

        tracing::debug!(rule, "No clip for preferred filler, rotating");
        self.rotate()
    }

    fn pick_neutral(&self) -> Option<&'static str> {
        let available: Vec<&'static str> = fillers::NEUTRAL
            .iter()
            .copied()
            .filter(|t| self.library.position(t).is_some())
            .collect();

        if available.is_empty() {
            return None;
        }

        let pick = rand::thread_rng().gen_range(0..available.len());
        Some(available[pick])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn library(texts: &[&str]) -> Arc<FillerLibrary> {
        Arc::new(FillerLibrary::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| FillerClip {
                    text: t.to_string(),
                    audio: AudioRef::new(format!("filler_{}.mp3", i)),
                })
                .collect(),
        ))
    }

    fn default_library() -> Arc<FillerLibrary> {
        library(fillers::DEFAULT_TEXTS)
    }

    #[test]
    fn test_rotation_never_repeats() {
        let selector = FillerSelector::new(default_library());
        let mut previous = selector.rotate().unwrap();

        for _ in 0..500 {
            let next = selector.rotate().unwrap();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_rotation_with_two_clips_alternates() {
        let selector = FillerSelector::new(library(&["Okay.", "Mm-hmm."]));
        let first = selector.rotate().unwrap();
        let second = selector.rotate().unwrap();
        let third = selector.rotate().unwrap();

        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_rotation_single_and_empty() {
        let selector = FillerSelector::new(library(&["Okay."]));
        assert_eq!(selector.rotate().unwrap().text, "Okay.");
        assert_eq!(selector.rotate().unwrap().text, "Okay.");

        let empty = FillerSelector::new(Arc::new(FillerLibrary::default()));
        assert!(empty.rotate().is_none());
        assert!(empty.select_for("Can you spell that?", 4).is_none());
    }

    #[test]
    fn test_content_rules() {
        let selector = FillerSelector::new(default_library());

        assert_eq!(
            selector.select_for("Could you SPELL your last name?", 5).unwrap().text,
            fillers::OKAY
        );
        assert_eq!(
            selector.select_for("And your date of birth?", 5).unwrap().text,
            fillers::MM_HMM
        );
        assert_eq!(
            selector.select_for("Tuesday at 3pm, is that correct?", 5).unwrap().text,
            fillers::YES
        );
    }

    #[test]
    fn test_rule_precedence() {
        let selector = FillerSelector::new(default_library());

        // Spelling beats date of birth
        let clip = selector
            .select_for("Can you spell your name and give your date of birth?", 6)
            .unwrap();
        assert_eq!(clip.text, fillers::OKAY);

        // Specific rules beat the early-turn rule
        let clip = selector.select_for("What's your DOB?", 1).unwrap();
        assert_eq!(clip.text, fillers::MM_HMM);
    }

    #[test]
    fn test_unclassified_and_early_turns_are_neutral() {
        let selector = FillerSelector::new(default_library());

        for turn in [1, 7] {
            let clip = selector
                .select_for("Thanks for calling, how can I help you today?", turn)
                .unwrap();
            assert!(fillers::NEUTRAL.contains(&clip.text.as_str()));
        }
    }

    #[test]
    fn test_missing_clip_falls_back_to_rotation() {
        let selector = FillerSelector::new(library(&["Sure.", "Right."]));
        let clip = selector.select_for("Can you spell that?", 3).unwrap();
        assert!(clip.text == "Sure." || clip.text == "Right.");
    }

    struct FlakySynth;

    #[async_trait]
    impl Synthesizer for FlakySynth {
        async fn synthesize(&self, text: &str) -> voicebot_core::Result<AudioRef> {
            if text == "Yes." {
                Err(voicebot_core::Error::Tts("HTTP 429".to_string()))
            } else {
                Ok(AudioRef::new(format!("{}.mp3", text.len())))
            }
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_build_skips_failures_and_duplicates() {
        let texts: Vec<String> = ["Okay.", "Yes.", "Okay.", " ", "Mm-hmm."]
            .iter()
            .map(|t| t.to_string())
            .collect();

        let library = FillerLibrary::build(&FlakySynth, &texts).await;
        let rendered: Vec<&str> = library.clips().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rendered, vec!["Okay.", "Mm-hmm."]);
    }
}
