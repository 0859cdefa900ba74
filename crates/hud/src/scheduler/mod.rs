//! Rebuild admission: debounce, single-flight, bounded wait.
//!
//! Change notifications from the host arrive in high-frequency,
//! semantically-overlapping bursts (several document fields updating in
//! one transaction). Rebuilding per-event would flicker, waste
//! discovery calls, and let out-of-order persistence writes clobber
//! newer user edits with stale ones. The scheduler gates every rebuild:
//!
//! - triggers inside the debounce window coalesce: the newest one
//!   survives, the rest report [`Admission::Superseded`];
//! - at most one build is ever in flight; a trigger arriving during a
//!   build awaits its completion notification (no polling), bounded by
//!   a hard ceiling, and is then serviced as a fresh build;
//! - a wait that exceeds the ceiling is abandoned with a debug log:
//!   a liveness safety valve, never a concurrent second build.
//!
//! In-flight builds are never cancelled; only the pending debounce
//! timer (abort-and-restart) and waiting requests are.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;

/// Default quiet period a burst of triggers must outlast.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

/// Default hard ceiling on waiting for an in-flight build.
pub const DEFAULT_WAIT_CEILING: Duration = Duration::from_secs(5);

/// Timing knobs, adjustable through settings.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
	pub debounce: Duration,
	pub wait_ceiling: Duration,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			debounce: DEFAULT_DEBOUNCE,
			wait_ceiling: DEFAULT_WAIT_CEILING,
		}
	}
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
	Idle,
	PendingDebounce,
	Building,
	WaitingOnPriorBuild,
}

/// Outcome of asking the scheduler for a build slot.
#[derive(Debug)]
pub enum Admission {
	/// This trigger won the window; run the build, then drop (or
	/// [`finish`](BuildPermit::finish)) the permit.
	Admitted(BuildPermit),
	/// A newer trigger restarted the debounce window; that trigger's
	/// admission covers this one.
	Superseded,
	/// The in-flight build outlived the wait ceiling; this trigger is
	/// dropped rather than ever running a second concurrent build.
	Abandoned,
}

impl Admission {
	pub fn is_admitted(&self) -> bool {
		matches!(self, Admission::Admitted(_))
	}
}

struct State {
	phase: BuildPhase,
	building: bool,
	waiters: usize,
	debounce_gen: u64,
	debounce_token: Option<CancellationToken>,
	config: SchedulerConfig,
	completed_total: u64,
	abandoned_total: u64,
}

struct Inner {
	state: Mutex<State>,
	done_tx: watch::Sender<u64>,
}

impl Inner {
	fn settle_phase(&self, state: &mut State) {
		// Waiters exist only while a build holds the slot; a queued
		// trigger must be observable as waiting, not as the build.
		state.phase = if state.waiters > 0 {
			BuildPhase::WaitingOnPriorBuild
		} else if state.building {
			BuildPhase::Building
		} else if state.debounce_token.is_some() {
			BuildPhase::PendingDebounce
		} else {
			BuildPhase::Idle
		};
	}
}

/// Serializes and coalesces rebuild requests.
pub struct RebuildScheduler {
	inner: Arc<Inner>,
}

impl RebuildScheduler {
	pub fn new(config: SchedulerConfig) -> Self {
		let (done_tx, _) = watch::channel(0);
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(State {
					phase: BuildPhase::Idle,
					building: false,
					waiters: 0,
					debounce_gen: 0,
					debounce_token: None,
					config,
					completed_total: 0,
					abandoned_total: 0,
				}),
				done_tx,
			}),
		}
	}

	/// Swaps the timing knobs in place. The scheduler instance survives
	/// a settings change, so an in-flight build keeps its slot and its
	/// waiters; only timers started after this call see the new values.
	pub fn set_config(&self, config: SchedulerConfig) {
		self.inner.state.lock().config = config;
	}

	pub fn phase(&self) -> BuildPhase {
		self.inner.state.lock().phase
	}

	/// Completed builds since construction.
	pub fn completed_total(&self) -> u64 {
		self.inner.state.lock().completed_total
	}

	/// Waiting triggers abandoned at the ceiling since construction.
	pub fn abandoned_total(&self) -> u64 {
		self.inner.state.lock().abandoned_total
	}

	/// Runs one trigger through the debounce and single-flight gates.
	///
	/// Cancel-safe: dropping the future before admission behaves like a
	/// superseded trigger.
	pub async fn admit(&self) -> Admission {
		let my_gen;
		let debounce;
		let token = {
			let mut state = self.inner.state.lock();
			if let Some(previous) = state.debounce_token.take() {
				previous.cancel();
			}
			let token = CancellationToken::new();
			state.debounce_gen += 1;
			my_gen = state.debounce_gen;
			state.debounce_token = Some(token.clone());
			debounce = state.config.debounce;
			if !state.building {
				state.phase = BuildPhase::PendingDebounce;
			}
			token
		};

		tokio::select! {
			biased;
			_ = token.cancelled() => return Admission::Superseded,
			_ = tokio::time::sleep(debounce) => {}
		}

		{
			let mut state = self.inner.state.lock();
			if state.debounce_gen != my_gen {
				return Admission::Superseded;
			}
			state.debounce_token = None;
		}

		self.wait_for_slot().await
	}

	/// Takes the build slot without debouncing. Edit commits go through
	/// here so their persisted writes never interleave with a rebuild's
	/// load-and-save window; the same ceiling applies.
	pub async fn acquire_slot(&self) -> Admission {
		self.wait_for_slot().await
	}

	// Single-flight gate: await the in-flight build's completion
	// notification under one overall deadline.
	async fn wait_for_slot(&self) -> Admission {
		let wait_ceiling = self.inner.state.lock().config.wait_ceiling;
		let deadline = tokio::time::Instant::now() + wait_ceiling;
		let mut done_rx = self.inner.done_tx.subscribe();
		loop {
			{
				let mut state = self.inner.state.lock();
				if !state.building {
					state.building = true;
					state.phase = BuildPhase::Building;
					return Admission::Admitted(BuildPermit { inner: self.inner.clone() });
				}
				state.waiters += 1;
				self.inner.settle_phase(&mut state);
			}

			let waited = {
				let _waiting = WaiterGuard { inner: &self.inner };
				tokio::time::timeout_at(deadline, done_rx.changed()).await
			};
			match waited {
				// Prior build finished; loop back and take the slot as
				// a fresh build.
				Ok(Ok(())) => {}
				Ok(Err(_)) | Err(_) => {
					tracing::debug!(
						ceiling_ms = wait_ceiling.as_millis() as u64,
						"in-flight build outlived the wait ceiling, abandoning trigger"
					);
					self.inner.state.lock().abandoned_total += 1;
					return Admission::Abandoned;
				}
			}
		}
	}
}

/// Restores the waiter count even when the admission future is dropped
/// mid-wait.
struct WaiterGuard<'a> {
	inner: &'a Inner,
}

impl Drop for WaiterGuard<'_> {
	fn drop(&mut self) {
		let mut state = self.inner.state.lock();
		state.waiters -= 1;
		self.inner.settle_phase(&mut state);
	}
}

/// Exclusive right to run the one in-flight build.
///
/// Dropping the permit marks the build complete and wakes every
/// waiting trigger, whether the build committed or aborted.
pub struct BuildPermit {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for BuildPermit {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BuildPermit").finish_non_exhaustive()
	}
}

impl BuildPermit {
	/// Explicit completion; identical to dropping.
	pub fn finish(self) {}
}

impl Drop for BuildPermit {
	fn drop(&mut self) {
		{
			let mut state = self.inner.state.lock();
			state.building = false;
			state.completed_total += 1;
			self.inner.settle_phase(&mut state);
		}
		self.inner.done_tx.send_modify(|count| *count += 1);
	}
}
