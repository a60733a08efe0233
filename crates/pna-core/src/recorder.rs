//! Macro recorder: the `Idle ⇄ Recording` session that captures dispatches.
//!
//! There is one session per process. It lives behind a [`MacroRecorder`]
//! handle that is cloned into the dispatcher and into whatever surface
//! drives start/stop (HTTP routes, CLI). Sequence ids are handed out under
//! the session lock, so recorded order is interception order even when
//! dispatches arrive from several tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PnaError, Result};
use crate::macro_file;
use crate::types::{DeviceClass, ParameterSet};

/// One captured dispatch. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub device_class: DeviceClass,
    pub operation: String,
    pub params: ParameterSet,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recording,
}

#[derive(Debug)]
pub struct MacroSession {
    state: SessionState,
    records: Vec<InvocationRecord>,
    destination: Option<PathBuf>,
    next_seq: u64,
}

impl Default for MacroSession {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            records: Vec::new(),
            destination: None,
            next_seq: 1,
        }
    }
}

pub type SharedSession = Arc<Mutex<MacroSession>>;

/// Result of [`MacroRecorder::stop`].
///
/// The session is `Idle` regardless of whether the write succeeded; a failed
/// write is reported here and not retried.
#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub records: Vec<InvocationRecord>,
    pub saved_to: Option<PathBuf>,
    pub write_error: Option<String>,
}

/// Read-only view for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct RecorderStatus {
    pub state: SessionState,
    pub destination: Option<PathBuf>,
    pub recorded: usize,
}

#[derive(Clone, Default)]
pub struct MacroRecorder {
    session: SharedSession,
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin recording into `dest`.
    ///
    /// The destination is opened for writing up front (without truncating
    /// it) so an unwritable path fails here rather than at `stop`.
    pub fn start(&self, dest: &Path) -> Result<()> {
        let mut s = self.session.lock();
        if s.state == SessionState::Recording {
            return Err(PnaError::AlreadyRecording);
        }
        acquire(dest)?;
        s.state = SessionState::Recording;
        s.records.clear();
        s.next_seq = 1;
        s.destination = Some(dest.to_path_buf());
        info!(dest = %dest.display(), "macro recording started");
        Ok(())
    }

    /// Append a dispatch if recording; returns the assigned sequence id.
    pub fn add(
        &self,
        device_class: DeviceClass,
        operation: &str,
        params: &ParameterSet,
    ) -> Option<u64> {
        let mut s = self.session.lock();
        if s.state != SessionState::Recording {
            return None;
        }
        let sequence_id = s.next_seq;
        s.next_seq += 1;
        s.records.push(InvocationRecord {
            device_class,
            operation: operation.to_string(),
            params: params.clone(),
            sequence_id,
        });
        Some(sequence_id)
    }

    /// End the session and write the captured sequence if there is one.
    pub fn stop(&self) -> StopOutcome {
        let (records, destination) = {
            let mut s = self.session.lock();
            if s.state == SessionState::Idle {
                return StopOutcome {
                    records: Vec::new(),
                    saved_to: None,
                    write_error: None,
                };
            }
            s.state = SessionState::Idle;
            s.next_seq = 1;
            (std::mem::take(&mut s.records), s.destination.take())
        };

        let mut outcome = StopOutcome {
            records,
            saved_to: None,
            write_error: None,
        };
        if outcome.records.is_empty() {
            info!("macro recording stopped with nothing captured");
            return outcome;
        }
        if let Some(dest) = destination {
            match macro_file::save(&dest, &outcome.records) {
                Ok(()) => {
                    info!(dest = %dest.display(), count = outcome.records.len(), "macro saved");
                    outcome.saved_to = Some(dest);
                }
                Err(e) => {
                    warn!(dest = %dest.display(), error = %e, "failed to save macro");
                    outcome.write_error = Some(e.to_string());
                }
            }
        }
        outcome
    }

    /// Drop captured records without touching anything on disk.
    pub fn clear(&self) {
        let mut s = self.session.lock();
        s.records.clear();
        s.next_seq = 1;
    }

    pub fn is_recording(&self) -> bool {
        self.session.lock().state == SessionState::Recording
    }

    pub fn destination(&self) -> Option<PathBuf> {
        self.session.lock().destination.clone()
    }

    pub fn snapshot(&self) -> Vec<InvocationRecord> {
        self.session.lock().records.clone()
    }

    pub fn status(&self) -> RecorderStatus {
        let s = self.session.lock();
        RecorderStatus {
            state: s.state,
            destination: s.destination.clone(),
            recorded: s.records.len(),
        }
    }

    /// Write the current capture to `path` without ending the session.
    pub fn save_to(&self, path: &Path) -> Result<usize> {
        let records = self.snapshot();
        macro_file::save(path, &records)?;
        Ok(records.len())
    }
}

// Checks that `dest` can be written without creating it: an empty file left
// behind by a session that records nothing would not be a loadable macro.
fn acquire(dest: &Path) -> Result<()> {
    let probe = || -> std::io::Result<()> {
        if dest.exists() {
            std::fs::OpenOptions::new().write(true).open(dest)?;
            return Ok(());
        }
        let parent = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;
        tempfile::NamedTempFile::new_in(parent)?;
        Ok(())
    };
    probe().map_err(|e| PnaError::StorageUnavailable(format!("{}: {e}", dest.display())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
