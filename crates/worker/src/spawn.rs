use std::future::Future;
use std::sync::OnceLock;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::TaskClass;

/// No tokio runtime was available to run the task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no tokio runtime available for {label} ({class})")]
pub struct SpawnError {
	pub label: String,
	pub class: &'static str,
}

fn runtime_handle() -> Option<tokio::runtime::Handle> {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return Some(handle);
	}

	static FALLBACK_RT: OnceLock<Option<tokio::runtime::Runtime>> = OnceLock::new();
	let runtime = FALLBACK_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("scopevars-worker")
			.build()
			.inspect_err(|error| tracing::warn!(%error, "worker.fallback_runtime.failed"))
			.ok()
	});
	runtime.as_ref().map(|rt| rt.handle().clone())
}

/// Spawns an async task tagged with its class and a short label.
///
/// Uses the runtime of the calling context when there is one. Synchronous
/// callers outside any runtime share a lazily built two-thread runtime.
pub fn spawn<F>(class: TaskClass, label: &str, fut: F) -> Result<JoinHandle<F::Output>, SpawnError>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	let Some(handle) = runtime_handle() else {
		return Err(SpawnError {
			label: label.to_string(),
			class: class.as_str(),
		});
	};
	tracing::trace!(worker_class = class.as_str(), label, "worker.spawn");
	Ok(handle.spawn(fut))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn spawn_uses_current_runtime() {
		let handle = spawn(TaskClass::Interactive, "answer", async { 42 }).expect("runtime available");
		assert_eq!(handle.await.ok(), Some(42));
	}

	#[test]
	fn spawn_outside_runtime_uses_fallback() {
		let (tx, rx) = std::sync::mpsc::channel();
		let _handle = spawn(TaskClass::Background, "fallback", async move {
			let _ = tx.send("ran");
		})
		.expect("fallback runtime available");
		assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(2)).ok(), Some("ran"));
	}
}
