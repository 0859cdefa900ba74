//! User-facing notice queue.
//!
//! The engine surfaces very few things to the user, and only
//! actionable failures: persistence unavailable, save failed.
//! Notices are queued here and drained by the host's presentation
//! layer; the engine never renders them itself.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoticeLevel {
	#[default]
	Info,
	Warn,
	Error,
}

/// One queued user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
	pub level: NoticeLevel,
	pub message: String,
}

impl Notice {
	pub fn warn(message: impl Into<String>) -> Self {
		Self { level: NoticeLevel::Warn, message: message.into() }
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self { level: NoticeLevel::Error, message: message.into() }
	}
}

/// Shared queue of pending notices.
#[derive(Default)]
pub struct NoticeQueue {
	pending: Mutex<VecDeque<Notice>>,
}

impl NoticeQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, notice: Notice) {
		self.pending.lock().push_back(notice);
	}

	pub fn is_empty(&self) -> bool {
		self.pending.lock().is_empty()
	}

	/// Drains all pending notices for presentation.
	pub fn take_pending(&self) -> Vec<Notice> {
		self.pending.lock().drain(..).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_take_pending_drains() {
		let queue = NoticeQueue::new();
		queue.push(Notice::warn("first"));
		queue.push(Notice::error("second"));
		let taken = queue.take_pending();
		assert_eq!(taken.len(), 2);
		assert_eq!(taken[0].level, NoticeLevel::Warn);
		assert!(queue.is_empty());
	}
}
