//! Human-readable run output: `outputs/<timestamp>/`.
//!
//! | File | Content |
//! |---|---|
//! | `answer.md` | question, answer, disclaimer and degradation notes |
//! | `chat.md` | final generation prompt followed by the answer |
//! | `context.txt` / `sources.txt` | retrieved text (local / web mode) |
//! | `trace.json` | decision trace, written by [`JsonFileSink`](crate::JsonFileSink) |

use crate::TelemetryError;
use chrono::{DateTime, Local};
use docsage_core::{DegradationReason, RetrievalMode, RunStatus};
use std::path::{Path, PathBuf};

/// A per-run output directory.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    dir: PathBuf,
}

/// What goes into `answer.md`.
#[derive(Debug, Clone)]
pub struct AnswerDocument<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub status: RunStatus,
    pub disclaimer: Option<&'a str>,
    pub degradation: &'a [DegradationReason],
    pub quality_score: Option<u8>,
}

fn io_err(path: &Path, e: std::io::Error) -> TelemetryError {
    TelemetryError::Io(format!("{}: {e}", path.display()))
}

impl RunArtifacts {
    /// Create `base/<YYYY-MM-DD_HH-MM-SS>`, suffixing `-1`, `-2`... on collision.
    pub fn create(base: &Path, now: DateTime<Local>) -> Result<Self, TelemetryError> {
        let stamp = now.format("%Y-%m-%d_%H-%M-%S").to_string();
        std::fs::create_dir_all(base).map_err(|e| io_err(base, e))?;

        let mut dir = base.join(&stamp);
        let mut n = 0;
        loop {
            match std::fs::create_dir(&dir) {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    n += 1;
                    dir = base.join(format!("{stamp}-{n}"));
                }
                Err(e) => return Err(io_err(&dir, e)),
            }
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn trace_path(&self) -> PathBuf {
        self.dir.join("trace.json")
    }

    fn write(&self, name: &str, body: &str) -> Result<PathBuf, TelemetryError> {
        let path = self.dir.join(name);
        std::fs::write(&path, body).map_err(|e| io_err(&path, e))?;
        Ok(path)
    }

    pub fn write_answer(&self, doc: &AnswerDocument<'_>) -> Result<PathBuf, TelemetryError> {
        self.write("answer.md", &render_answer(doc))
    }

    pub fn write_chat(&self, prompt: &str, answer: &str) -> Result<PathBuf, TelemetryError> {
        self.write("chat.md", &format!("{prompt}\n\n---\n\n{answer}\n"))
    }

    /// `context.txt` for local runs, `sources.txt` for web runs.
    pub fn write_context(&self, mode: RetrievalMode, context: &str) -> Result<PathBuf, TelemetryError> {
        let name = match mode {
            RetrievalMode::Local => "context.txt",
            RetrievalMode::Web => "sources.txt",
        };
        self.write(name, context)
    }
}

fn render_answer(doc: &AnswerDocument<'_>) -> String {
    let mut out = format!("# Question\n\n{}\n\n# Answer\n\n", doc.question);
    // Drafts usually open with their own note already
    if let Some(disclaimer) = doc.disclaimer.filter(|d| !doc.answer.starts_with(d)) {
        out.push_str(&format!("> {disclaimer}\n\n"));
    }
    out.push_str(doc.answer.trim_end());
    out.push_str("\n\n---\n\n");

    let status = match doc.status {
        RunStatus::Accepted => "accepted",
        RunStatus::Degraded => "degraded",
        RunStatus::Declined => "declined",
        RunStatus::Failed => "failed",
    };
    out.push_str(&format!("Status: {status}"));
    if let Some(score) = doc.quality_score {
        out.push_str(&format!(" (quality {score}/10)"));
    }
    out.push('\n');
    for reason in doc.degradation {
        out.push_str(&format!("- {reason}\n"));
    }
    out
}
