use std::any::Any;

use tokio::task::JoinError;

/// Extracts the message of a caught panic payload.
///
/// Returns `None` for payloads that are neither `&str` nor `String`.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		return Some((*s).to_string());
	}
	payload.downcast_ref::<String>().cloned()
}

/// Message of a task that panicked. `None` when the task was aborted instead.
pub fn join_error_panic_message(error: JoinError) -> Option<String> {
	let payload = error.try_into_panic().ok()?;
	Some(panic_message(&*payload).unwrap_or_else(|| "<non-string panic payload>".to_string()))
}

#[cfg(test)]
mod tests {
	use std::panic::catch_unwind;

	use super::*;

	#[test]
	fn extracts_static_str_payload() {
		let payload = catch_unwind(|| panic!("boom-str")).unwrap_err();
		let msg = panic_message(&*payload).expect("should be a message");
		assert!(msg.contains("boom-str"), "expected 'boom-str', got: {msg}");
	}

	#[test]
	fn extracts_string_payload() {
		let payload = catch_unwind(|| panic!("{}", String::from("boom-string"))).unwrap_err();
		let msg = panic_message(&*payload).expect("should be a message");
		assert!(msg.contains("boom-string"), "expected 'boom-string', got: {msg}");
	}

	#[test]
	fn returns_none_for_other_payloads() {
		let payload = catch_unwind(|| std::panic::panic_any(7_u32)).unwrap_err();
		assert!(panic_message(&*payload).is_none());
	}

	#[tokio::test]
	async fn join_error_carries_the_panic() {
		let err = tokio::spawn(async { panic!("boom-task") }).await.unwrap_err();
		let msg = join_error_panic_message(err).expect("should be a panic");
		assert!(msg.contains("boom-task"), "expected 'boom-task', got: {msg}");
	}

	#[tokio::test]
	async fn join_error_is_none_for_aborted_tasks() {
		let handle = tokio::spawn(async {
			tokio::time::sleep(std::time::Duration::from_secs(60)).await;
		});
		handle.abort();
		let err = handle.await.unwrap_err();
		assert!(join_error_panic_message(err).is_none(), "aborted task should return None");
	}
}
