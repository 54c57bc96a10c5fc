use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation source shared by every handle one owner issues.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a clock whose first issued generation is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Issues a fresh cancel handle stamped with the next generation.
	pub fn issue(&self) -> CancelHandle {
		let generation = self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		CancelHandle {
			generation,
			token: CancellationToken::new(),
		}
	}
}

/// Cancellation handle for one in-flight unit of work.
///
/// Two handles for the same piece of work never share a generation, so a
/// completion carrying an old generation can be recognised and dropped.
#[derive(Debug, Clone)]
pub struct CancelHandle {
	generation: u64,
	token: CancellationToken,
}

impl CancelHandle {
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Resolves once [`Self::cancel`] has been called on any clone.
	pub async fn cancelled(&self) {
		self.token.cancelled().await;
	}

	/// Token observed by the work itself, for cooperative early exits.
	pub fn token(&self) -> CancellationToken {
		self.token.clone()
	}

	/// Drives `fut` to completion unless the handle is cancelled first.
	///
	/// Returns `None` when cancellation won; the future is dropped at that point.
	pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
	where
		F: Future,
	{
		tokio::select! {
			biased;
			_ = self.token.cancelled() => None,
			out = fut => Some(out),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn generations_are_monotonic_across_clones() {
		let clock = GenerationClock::new();
		let other = clock.clone();
		let a = clock.issue();
		let b = other.issue();
		let c = clock.issue();
		assert_eq!((a.generation(), b.generation(), c.generation()), (1, 2, 3));
	}

	#[tokio::test]
	async fn run_until_cancelled_completes_normally() {
		let handle = GenerationClock::new().issue();
		assert_eq!(handle.run_until_cancelled(async { "done" }).await, Some("done"));
	}

	#[tokio::test]
	async fn cancel_preempts_slow_work() {
		let handle = GenerationClock::new().issue();
		let remote = handle.clone();
		let task = tokio::spawn(async move { handle.run_until_cancelled(tokio::time::sleep(Duration::from_secs(60))).await });
		tokio::task::yield_now().await;
		remote.cancel();
		let out = tokio::time::timeout(Duration::from_millis(500), task)
			.await
			.expect("cancellation should not hang")
			.expect("task should not panic");
		assert!(out.is_none());
		assert!(remote.is_cancelled());
	}
}
