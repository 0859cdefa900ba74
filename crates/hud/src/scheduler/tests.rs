use std::sync::Arc;
use std::time::Duration;

use tokio::time::{advance, sleep};

use super::*;

fn scheduler() -> Arc<RebuildScheduler> {
	Arc::new(RebuildScheduler::new(SchedulerConfig::default()))
}

#[tokio::test(start_paused = true)]
async fn test_single_trigger_is_admitted() {
	let sched = scheduler();
	assert_eq!(sched.phase(), BuildPhase::Idle);

	let admission = sched.admit().await;
	assert!(admission.is_admitted());
	assert_eq!(sched.phase(), BuildPhase::Building);

	drop(admission);
	assert_eq!(sched.phase(), BuildPhase::Idle);
	assert_eq!(sched.completed_total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_to_one_build() {
	// Spec property: N overlapping triggers within the debounce window
	// must result in exactly one completed build.
	let sched = scheduler();
	let mut handles = Vec::new();
	for _ in 0..5 {
		let sched = sched.clone();
		handles.push(tokio::spawn(async move { sched.admit().await }));
		// Stay inside the 10ms window.
		sleep(Duration::from_millis(1)).await;
	}

	let mut admitted = 0;
	let mut superseded = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Admission::Admitted(permit) => {
				admitted += 1;
				permit.finish();
			}
			Admission::Superseded => superseded += 1,
			Admission::Abandoned => panic!("nothing should hit the ceiling"),
		}
	}
	assert_eq!(admitted, 1);
	assert_eq!(superseded, 4);
	assert_eq!(sched.completed_total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_after_window_runs_again() {
	let sched = scheduler();
	assert!(sched.admit().await.is_admitted());
	// Permit dropped immediately; the window is long over.
	advance(Duration::from_millis(50)).await;
	assert!(sched.admit().await.is_admitted());
	assert_eq!(sched.completed_total(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_during_build_waits_then_runs_fresh() {
	// Spec scenario: T2 arrives while Building, the build finishes
	// after 50ms, T2 is then serviced as a fresh build.
	let sched = scheduler();
	let Admission::Admitted(permit) = sched.admit().await else {
		panic!("first trigger must be admitted");
	};

	let waiter = {
		let sched = sched.clone();
		tokio::spawn(async move { sched.admit().await })
	};
	sleep(Duration::from_millis(20)).await;
	assert_eq!(sched.phase(), BuildPhase::WaitingOnPriorBuild);

	sleep(Duration::from_millis(30)).await;
	permit.finish();

	let admission = waiter.await.unwrap();
	assert!(admission.is_admitted());
	assert_eq!(sched.phase(), BuildPhase::Building);
	drop(admission);
	assert_eq!(sched.completed_total(), 2);
	assert_eq!(sched.abandoned_total(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_ceiling_abandons_instead_of_running_concurrently() {
	let sched = scheduler();
	let Admission::Admitted(permit) = sched.admit().await else {
		panic!("first trigger must be admitted");
	};

	let waiter = {
		let sched = sched.clone();
		tokio::spawn(async move { sched.admit().await })
	};

	// Outlive the 5s ceiling while the build never finishes.
	sleep(Duration::from_secs(6)).await;
	let admission = waiter.await.unwrap();
	assert!(matches!(admission, Admission::Abandoned));
	assert_eq!(sched.abandoned_total(), 1);

	// The stuck build still owns the slot; its completion recovers.
	assert_eq!(sched.phase(), BuildPhase::Building);
	permit.finish();
	assert!(sched.admit().await.is_admitted());
}

#[tokio::test(start_paused = true)]
async fn test_config_change_during_build_keeps_single_flight() {
	// A settings change must not hand out a second build slot while a
	// build started under the old timings is still in flight.
	let sched = scheduler();
	let Admission::Admitted(permit) = sched.admit().await else {
		panic!("first trigger must be admitted");
	};

	sched.set_config(SchedulerConfig {
		debounce: Duration::from_millis(5),
		wait_ceiling: Duration::from_secs(5),
	});
	let waiter = {
		let sched = sched.clone();
		tokio::spawn(async move { sched.admit().await })
	};
	sleep(Duration::from_millis(20)).await;
	assert_eq!(sched.phase(), BuildPhase::WaitingOnPriorBuild);

	permit.finish();
	let admission = waiter.await.unwrap();
	assert!(admission.is_admitted());
	drop(admission);
	assert_eq!(sched.completed_total(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_slot_waits_for_inflight_build() {
	let sched = scheduler();
	let Admission::Admitted(permit) = sched.admit().await else {
		panic!("first trigger must be admitted");
	};

	let edit = {
		let sched = sched.clone();
		tokio::spawn(async move { sched.acquire_slot().await })
	};
	sleep(Duration::from_millis(20)).await;
	assert_eq!(sched.phase(), BuildPhase::WaitingOnPriorBuild);

	permit.finish();
	assert!(edit.await.unwrap().is_admitted());
}

#[tokio::test(start_paused = true)]
async fn test_admission_is_loggable() {
	let sched = scheduler();
	let admission = sched.admit().await;
	assert_eq!(format!("{admission:?}"), "Admitted(BuildPermit { .. })");
}

#[tokio::test(start_paused = true)]
async fn test_debounce_restart_supersedes_earlier_trigger() {
	let sched = scheduler();
	let first = {
		let sched = sched.clone();
		tokio::spawn(async move { sched.admit().await })
	};
	sleep(Duration::from_millis(5)).await;
	assert_eq!(sched.phase(), BuildPhase::PendingDebounce);

	// Restarts the window: the first trigger never fires.
	let second = sched.admit().await;
	assert!(second.is_admitted());
	assert!(matches!(first.await.unwrap(), Admission::Superseded));
}
