//! Plain-text call transcripts
//!
//! One file per call, `{dir}/{scenario}_{first 8 chars of call id}.txt`:
//!
//! ```text
//! ---
//! SCENARIO: hipaa_spouse_deep
//! CALL SID: CA1234567890
//! DATE: 2024-05-01 14:03:22
//! ---
//!
//! [AGENT]: Thanks for calling, how can I help?
//!
//! [PATIENT]: Hi, I'm calling about my wife's appointment.
//!
//! --- CALL ENDED (duration: 74s) ---
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use voicebot_core::{TranscriptSink, TranscriptStore, Turn, TurnRole};

use crate::PersistenceError;

/// Opens [`FileTranscript`] sinks under one directory
#[derive(Debug, Clone)]
pub struct FileTranscriptStore {
    dir: PathBuf,
}

impl FileTranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &voicebot_config::TranscriptConfig) -> Self {
        Self::new(&config.dir)
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn open(&self, scenario: &str, call_id: &str) -> Box<dyn TranscriptSink> {
        Box::new(FileTranscript::new(self.dir.clone(), scenario, call_id))
    }
}

/// Transcript of a single call, buffered in memory until the call ends
#[derive(Debug)]
pub struct FileTranscript {
    dir: PathBuf,
    scenario: String,
    call_id: String,
    started_at: DateTime<Local>,
    entries: Vec<Turn>,
}

impl FileTranscript {
    pub fn new(dir: PathBuf, scenario: &str, call_id: &str) -> Self {
        Self {
            dir,
            scenario: scenario.to_string(),
            call_id: call_id.to_string(),
            started_at: Local::now(),
            entries: Vec::new(),
        }
    }

    pub fn file_name(&self) -> String {
        let short_id: String = self.call_id.chars().take(8).collect();
        format!("{}_{}.txt", self.scenario, short_id)
    }

    /// Transcript text as written to disk
    pub fn render(&self, duration_secs: u64) -> String {
        let mut out = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(out, "---");
        let _ = writeln!(out, "SCENARIO: {}", self.scenario);
        let _ = writeln!(out, "CALL SID: {}", self.call_id);
        let _ = writeln!(out, "DATE: {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "---\n");

        for entry in &self.entries {
            let _ = writeln!(out, "[{}]: {}\n", entry.role.transcript_label(), entry.text);
        }

        let _ = writeln!(out, "--- CALL ENDED (duration: {}s) ---", duration_secs);
        out
    }

    async fn write(&self, duration_secs: u64) -> Result<String, PersistenceError> {
        let path = self.dir.join(self.file_name());
        let location = path.display().to_string();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistenceError::Write {
                path: self.dir.display().to_string(),
                source,
            })?;

        tokio::fs::write(&path, self.render(duration_secs))
            .await
            .map_err(|source| PersistenceError::Write {
                path: location.clone(),
                source,
            })?;

        Ok(location)
    }
}

#[async_trait]
impl TranscriptSink for FileTranscript {
    fn record_turn(&mut self, role: TurnRole, text: &str) {
        self.entries.push(Turn {
            role,
            text: text.to_string(),
        });
    }

    fn entries(&self) -> &[Turn] {
        &self.entries
    }

    async fn flush(&mut self, duration_secs: u64) -> voicebot_core::Result<String> {
        if self.scenario.contains(std::path::MAIN_SEPARATOR) || self.scenario.contains('/') {
            return Err(PersistenceError::InvalidLocation(self.scenario.clone()).into());
        }

        let location = self.write(duration_secs).await?;
        tracing::info!(
            call_id = %self.call_id,
            path = %location,
            turns = self.entries.len(),
            "Transcript saved"
        );
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_uses_call_id_prefix() {
        let transcript = FileTranscript::new(PathBuf::from("t"), "insurance_pressure", "CA1234567890abcdef");
        assert_eq!(transcript.file_name(), "insurance_pressure_CA123456.txt");

        let short = FileTranscript::new(PathBuf::from("t"), "x", "CA1");
        assert_eq!(short.file_name(), "x_CA1.txt");
    }

    #[test]
    fn test_render_format() {
        let mut transcript = FileTranscript::new(PathBuf::from("t"), "emergency_mid_call", "CA42");
        transcript.record_turn(TurnRole::Agent, "How can I help?");
        transcript.record_turn(TurnRole::Caller, "I'd like a follow up.");

        let text = transcript.render(31);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "---");
        assert_eq!(lines[1], "SCENARIO: emergency_mid_call");
        assert_eq!(lines[2], "CALL SID: CA42");
        assert!(lines[3].starts_with("DATE: "));
        assert_eq!(lines[4], "---");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "[AGENT]: How can I help?");
        assert_eq!(lines[7], "");
        assert_eq!(lines[8], "[PATIENT]: I'd like a follow up.");
        assert_eq!(lines[9], "");
        assert_eq!(lines[10], "--- CALL ENDED (duration: 31s) ---");
    }

    #[tokio::test]
    async fn test_flush_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTranscriptStore::new(dir.path().join("transcripts"));

        let mut sink = store.open("hipaa_spouse_deep", "CAabcdef0123");
        sink.record_turn(TurnRole::Agent, "Hello?");
        sink.record_turn(TurnRole::Caller, "Hi, I'm calling about my wife.");
        assert_eq!(sink.entries().len(), 2);

        let location = sink.flush(12).await.unwrap();
        assert!(location.ends_with("hipaa_spouse_deep_CAabcdef.txt"));

        let written = std::fs::read_to_string(&location).unwrap();
        assert!(written.contains("[PATIENT]: Hi, I'm calling about my wife."));
        assert!(written.ends_with("--- CALL ENDED (duration: 12s) ---\n"));
    }

    #[tokio::test]
    async fn test_flush_rejects_path_in_scenario_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTranscriptStore::new(dir.path());

        let mut sink = store.open("../escape", "CA1");
        let err = sink.flush(0).await.unwrap_err();
        assert!(matches!(err, voicebot_core::Error::Transcript(_)));
    }
}
