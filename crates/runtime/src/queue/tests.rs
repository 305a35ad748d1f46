use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::failure::with_timeout;

const ERROR_KIND: &str = "vizor:error";

fn queue() -> MessageQueue {
	MessageQueue::new(ERROR_KIND)
}

/// A wait that does not settle within a short grace period is pending.
async fn still_pending(wait: &mut PendingMessage) -> bool {
	tokio::time::timeout(Duration::from_millis(50), wait).await.is_err()
}

#[tokio::test]
async fn wait_resolves_with_the_first_arg() {
	let queue = queue();
	let wait = queue.wait_for("vizor:setStories");

	queue.receive_message("vizor:setStories", &[json!({"stories": []}), json!("extra")]);

	assert_eq!(wait.await.unwrap(), json!({"stories": []}));
}

#[tokio::test]
async fn waits_of_the_same_kind_settle_in_fifo_order_one_per_message() {
	let queue = queue();
	let first = queue.wait_for("vizor:readyiPhone 8");
	let mut second = queue.wait_for("vizor:readyiPhone 8");

	queue.receive_message("vizor:readyiPhone 8", &[json!(1)]);
	assert_eq!(first.await.unwrap(), json!(1));
	assert!(
		still_pending(&mut second).await,
		"one message must settle exactly one wait"
	);

	queue.receive_message("vizor:readyiPhone 8", &[json!(2)]);
	assert_eq!(second.await.unwrap(), json!(2));
}

#[tokio::test]
async fn non_matching_conditions_are_passed_over() {
	let queue = queue();
	let condition: Condition =
		Arc::new(|args| args.first().and_then(|arg| arg["platform"].as_str()) == Some("ios"));
	let mut guarded = queue.wait_for_matching("vizor:didPrepare", Some(condition));
	let open = queue.wait_for("vizor:didPrepare");

	queue.receive_message("vizor:didPrepare", &[json!({"platform": "android"})]);

	assert_eq!(open.await.unwrap(), json!({"platform": "android"}));
	assert!(still_pending(&mut guarded).await);
}

#[tokio::test]
async fn listeners_fire_on_every_match_until_cleared() {
	let queue = queue();
	let seen = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&seen);
	queue.add_listener("vizor:didPrepare", move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});

	queue.receive_message("vizor:didPrepare", &[json!({"deviceModel": "iPhone 8"})]);
	queue.receive_message("vizor:didPrepare", &[json!({"deviceModel": "Pixel 4"})]);
	assert_eq!(seen.load(Ordering::SeqCst), 2);

	queue.clear_listeners();
	queue.receive_message("vizor:didPrepare", &[json!({"deviceModel": "iPad"})]);
	assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn error_messages_reach_every_listener_and_reject_the_oldest_wait() {
	let queue = queue();
	let seen = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&seen);
	queue.add_listener("vizor:captureScreenCompleted", move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});
	let oldest = queue.wait_for("vizor:readyiPhone 8");
	let mut newer = queue.wait_for("vizor:setStories");

	queue.receive_message(
		ERROR_KIND,
		&[json!({"error": {"message": "render crashed", "stack": "at App"}, "isFatal": true})],
	);

	assert_eq!(seen.load(Ordering::SeqCst), 1, "error must reach listeners of any kind");
	match oldest.await {
		Err(Error::Device { message, stack, is_fatal }) => {
			assert_eq!(message, "render crashed");
			assert_eq!(stack.as_deref(), Some("at App"));
			assert!(is_fatal);
		}
		other => panic!("expected device error, got {other:?}"),
	}
	assert!(
		still_pending(&mut newer).await,
		"an error settles only the oldest wait"
	);
}

#[tokio::test]
async fn reject_all_clears_every_pending_wait() {
	let queue = queue();
	let first = queue.wait_for("vizor:setStories");
	let second = queue.wait_for("vizor:readyiPhone 8");

	queue.reject_all(&Error::ConnectionClosed);

	assert!(matches!(first.await, Err(Error::ConnectionClosed)));
	assert!(matches!(second.await, Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn reject_all_of_type_spares_other_kinds() {
	let queue = queue();
	let stale = queue.wait_for("vizor:readyiPhone 8");
	let unrelated = queue.wait_for("vizor:setStories");

	queue.reject_all_of_type(
		"vizor:readyiPhone 8",
		&Error::Timeout("vizor:readyiPhone 8".to_owned()),
	);

	assert!(matches!(stale.await, Err(Error::Timeout(_))));

	queue.receive_message("vizor:setStories", &[json!({"stories": []})]);
	assert!(unrelated.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn a_late_message_has_no_effect_on_a_timed_out_wait() {
	let queue = queue();
	let wait = queue.wait_for("vizor:readyiPhone 8");
	let result = with_timeout(Duration::from_millis(10), "vizor:readyiPhone 8", wait).await;
	assert!(matches!(result, Err(Error::Timeout(_))));
	queue.reject_all_of_type(
		"vizor:readyiPhone 8",
		&Error::Timeout("vizor:readyiPhone 8".to_owned()),
	);

	// The stale reply arrives after rejection: a fresh wait still gets the
	// next message, proving the old registration is gone.
	queue.receive_message("vizor:readyiPhone 8", &[json!("stale")]);
	let fresh = queue.wait_for("vizor:readyiPhone 8");
	queue.receive_message("vizor:readyiPhone 8", &[json!("fresh")]);
	assert_eq!(fresh.await.unwrap(), json!("fresh"));
}

#[tokio::test]
async fn a_dropped_wait_never_consumes_a_message() {
	let queue = queue();
	let abandoned = queue.wait_for("vizor:readyiPhone 8");
	drop(abandoned);
	let live = queue.wait_for("vizor:readyiPhone 8");

	queue.receive_message("vizor:readyiPhone 8", &[json!("for the living")]);

	assert_eq!(live.await.unwrap(), json!("for the living"));
}

#[tokio::test]
async fn unparseable_error_payloads_still_reject_as_device_errors() {
	let queue = queue();
	let wait = queue.wait_for("vizor:setStories");

	queue.receive_message(ERROR_KIND, &[json!("not an error object")]);

	match wait.await {
		Err(Error::Device { is_fatal, .. }) => assert!(!is_fatal),
		other => panic!("expected device error, got {other:?}"),
	}
}
