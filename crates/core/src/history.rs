use std::{collections::VecDeque, time::SystemTime};

use serde::Serialize;

use crate::{analysis::AnalysisResult, format::format_timestamp};

/// A user-confirmed capture. Lives only for the current session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Capture time in milliseconds since the epoch, bumped when needed to stay unique.
    pub id: u64,
    pub timestamp: String,
    /// JPEG data URL of the rendered canvas.
    pub screenshot: String,
    pub analysis: AnalysisResult,
}

/// Newest-first capture list with an optional size cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: Option<usize>,
    last_id: Option<u64>,
    visible: bool,
}

impl SessionHistory {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.filter(|c| *c > 0),
            last_id: None,
            visible: false,
        }
    }

    /// Prepends a capture and returns its id, or `None` without a valid analysis.
    pub fn save(
        &mut self,
        analysis: Option<&AnalysisResult>,
        screenshot: String,
        at: SystemTime,
    ) -> Option<u64> {
        let analysis = analysis.filter(|a| a.valid_pose)?;

        let millis = at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let id = match self.last_id {
            Some(last) if millis <= last => last + 1,
            _ => millis,
        };
        self.last_id = Some(id);

        self.entries.push_front(HistoryEntry {
            id,
            timestamp: format_timestamp(at),
            screenshot,
            analysis: analysis.clone(),
        });

        if let Some(capacity) = self.capacity {
            self.entries.truncate(capacity);
        }

        Some(id)
    }

    /// Flips the panel flag only; entries are untouched.
    pub fn toggle_visible(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
