//! Integration tests for [`chat_controller::ChatController`] against a scripted bot.
//!
//! Covers: turn collection (count bounds, overshoot, quiet period, validator, strict mode,
//! listener cleanup, action spacing), inline and reply keyboard clicks, ping, and inline queries.
//! All tests run on a paused tokio clock, so scripted delays cost no real time.

use std::future::{ready, Ready};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_controller::{
    ButtonSelector, ChatController, ClickOptions, InlineQueryOptions, PingOptions,
    TerminationPolicy,
};
use tgprobe_core::testing::{CallbackBehavior, ScriptedClient, ScriptedReply};
use tgprobe_core::{
    AdapterError, Button, CallbackAnswer, IncomingMessage, InlineResult, InlineResultPage,
    KeyboardMarkup, NotClickableReason, ProbeError, SwitchPmOffer, Violation,
};
use tokio::time::Instant;

const BOT_ID: i64 = 12345;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn setup() -> (ScriptedClient, ChatController) {
    let client = ScriptedClient::new(BOT_ID);
    let controller = ChatController::new(Arc::new(client.clone()), "quiz_bot")
        .with_global_action_delay(Duration::ZERO);
    (client, controller)
}

/// Trigger that makes the scripted bot emit each message after its delay (in ms).
fn emitting(
    client: &ScriptedClient,
    replies: Vec<(u64, IncomingMessage)>,
) -> impl FnOnce() -> Ready<tgprobe_core::Result<()>> {
    let client = client.clone();
    move || {
        for (delay, message) in replies {
            client.emit_after(ms(delay), message);
        }
        ready(Ok(()))
    }
}

fn menu_message(client: &ScriptedClient) -> IncomingMessage {
    client.message("Pick one").with_markup(KeyboardMarkup::Inline(vec![
        vec![Button::callback("A", "a"), Button::callback("B", "b")],
        vec![Button::callback("C", "c")],
        vec![Button::url("Website", "https://example.org"), Button::text("Inert")],
    ]))
}

/// **Test: a message 10ms after the trigger is collected on the next tick.**
///
/// **Setup:** policy {min 1, max_wait 1000ms}; bot emits one message after 10ms.
/// **Expected:** one message, returned within 10..=110ms.
#[tokio::test(start_paused = true)]
async fn test_collect_single_message() {
    let (client, controller) = setup();
    let reply = client.message("Hello");
    let policy = TerminationPolicy::new().min(1).max_wait(ms(1000));

    let started = Instant::now();
    let response = controller
        .collect(&policy, emitting(&client, vec![(10, reply)]))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.count(), 1);
    assert_eq!(response.first().unwrap().text.as_deref(), Some("Hello"));
    assert!(elapsed >= ms(10) && elapsed <= ms(110), "elapsed {:?}", elapsed);
    assert_eq!(client.listener_count(), 0);
}

/// **Test: strict mode raises when nothing arrives before max_wait.**
#[tokio::test(start_paused = true)]
async fn test_collect_strict_timeout_raises() {
    let (client, controller) = setup();
    let policy = TerminationPolicy::new().min(1).max_wait(ms(100)).strict(true);

    let err = controller
        .collect(&policy, emitting(&client, vec![]))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "turn expectation violated: expected at least 1, got 0"
    );
    assert_eq!(client.listener_count(), 0);
}

/// **Test: non-strict mode returns the partial buffer at max_wait.**
#[tokio::test(start_paused = true)]
async fn test_collect_non_strict_returns_partial() {
    let (client, controller) = setup();
    let first = client.message("only one");
    let policy = TerminationPolicy::new().min(3).max_wait(ms(500));

    let response = controller
        .collect(&policy, emitting(&client, vec![(50, first)]))
        .await
        .unwrap();

    assert_eq!(response.count(), 1);
}

/// **Test: exact count stops as soon as it is exceeded and keeps the overshoot.**
///
/// **Setup:** exact(2); three messages arrive within the same tick.
/// **Expected:** non-strict returns all three; strict raises "expected at most 2, got 3".
#[tokio::test(start_paused = true)]
async fn test_collect_exact_count_overshoot_not_trimmed() {
    let (client, controller) = setup();
    let burst: Vec<(u64, IncomingMessage)> =
        (0..3).map(|i| (10, client.message(&format!("m{}", i)))).collect();
    let policy = TerminationPolicy::new().exact(2).max_wait(ms(5000));

    let started = Instant::now();
    let response = controller
        .collect(&policy, emitting(&client, burst))
        .await
        .unwrap();
    assert_eq!(response.count(), 3);
    assert!(started.elapsed() < ms(5000));

    let burst: Vec<(u64, IncomingMessage)> =
        (0..3).map(|i| (10, client.message(&format!("n{}", i)))).collect();
    let strict = policy.clone().strict(true);
    let err = controller
        .collect(&strict, emitting(&client, burst))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProbeError::ExpectationViolated(Violation::TooMany {
            expected: 2,
            actual: 3
        })
    ));
}

/// **Test: the quiet period keeps collecting until the bot stays silent long enough.**
///
/// **Setup:** min 1, quiet 200ms; messages at 10, 150, 250ms and a straggler at 2000ms.
/// **Expected:** the three burst messages; the straggler is not captured and no listener leaks.
#[tokio::test(start_paused = true)]
async fn test_collect_waits_for_quiet_period() {
    let (client, controller) = setup();
    let script = vec![
        (10, client.message("one")),
        (150, client.message("two")),
        (250, client.message("three")),
        (2000, client.message("late")),
    ];
    let policy = TerminationPolicy::new()
        .min(1)
        .wait_consecutive(ms(200))
        .max_wait(ms(5000));

    let response = controller
        .collect(&policy, emitting(&client, script))
        .await
        .unwrap();

    assert_eq!(response.full_text(), "one\ntwo\nthree");
    assert_eq!(client.listener_count(), 0);
}

/// **Test: the validator holds the turn open until it accepts the buffer.**
#[tokio::test(start_paused = true)]
async fn test_collect_validator() {
    let (client, controller) = setup();
    let script = vec![
        (10, client.message("working...")),
        (250, client.message("done")),
    ];
    let policy = TerminationPolicy::new()
        .min(1)
        .max_wait(ms(3000))
        .validator(|msgs| msgs.iter().any(|m| m.text.as_deref() == Some("done")));

    let response = controller
        .collect(&policy, emitting(&client, script))
        .await
        .unwrap();

    assert_eq!(response.count(), 2);
    assert_eq!(response.last().unwrap().text.as_deref(), Some("done"));
}

/// **Test: messages for other chats are ignored; edits of the peer's messages count.**
#[tokio::test(start_paused = true)]
async fn test_collect_filters_by_peer_and_keeps_edits() {
    let (client, controller) = setup();
    let script = vec![
        (10, IncomingMessage::text(999, 1, "someone else")),
        (20, client.message("Edited Hello").edited()),
    ];
    let policy = TerminationPolicy::new().min(1).max_wait(ms(1000));

    let response = controller
        .collect(&policy, emitting(&client, script))
        .await
        .unwrap();

    assert_eq!(response.count(), 1);
    assert!(response.first().unwrap().edited);
    assert_eq!(response.full_text(), "Edited Hello");
}

/// **Test: a failing trigger propagates the adapter error and still removes the listener.**
#[tokio::test(start_paused = true)]
async fn test_collect_trigger_failure_unregisters_listener() {
    let (client, controller) = setup();
    client.fail_on_text("/boom");
    let ctl = &controller;

    let err = controller
        .collect(&TerminationPolicy::new(), || async move {
            ctl.send_text("/boom").await.map(|_| ())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Adapter(AdapterError::Network(_))));
    assert_eq!(client.listener_count(), 0);
}

/// **Test: consecutive collects are spaced by the global action delay.**
#[tokio::test(start_paused = true)]
async fn test_collect_respects_global_action_delay() {
    let client = ScriptedClient::new(BOT_ID);
    let controller = ChatController::new(Arc::new(client.clone()), BOT_ID)
        .with_global_action_delay(ms(800));
    let policy = TerminationPolicy::new().min(0);

    controller
        .collect(&policy, emitting(&client, vec![]))
        .await
        .unwrap();
    let first_done = Instant::now();

    let triggered_at = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&triggered_at);
    controller
        .collect(&policy, move || {
            *sink.lock().unwrap() = Some(Instant::now());
            ready(Ok(()))
        })
        .await
        .unwrap();

    let triggered_at = triggered_at.lock().unwrap().unwrap();
    assert!(triggered_at.duration_since(first_done) >= ms(800));
}

/// **Test: ping sends every message and collects the replies as one turn.**
#[tokio::test(start_paused = true)]
async fn test_ping_bot() {
    let (client, controller) = setup();
    client.on_text("/start", vec![ScriptedReply::after(ms(20), client.message("Welcome!"))]);

    let response = controller
        .ping_bot(PingOptions {
            messages: vec!["/start".to_string(), "hello".to_string()],
            max_wait: Some(ms(2000)),
        })
        .await
        .unwrap();

    assert_eq!(client.sent_texts(), vec!["/start", "hello"]);
    assert_eq!(client.sent_to()[0].0, BOT_ID);
    assert_eq!(response.full_text(), "Welcome!");
}

/// **Test: clicking by index resolves row-major, same as clicking by unique text.**
///
/// **Setup:** keyboard [[A, B], [C], ...].
/// **Expected:** click(1) and click("B") both press payload "b" with a wait of max_wait + 100ms.
#[tokio::test(start_paused = true)]
async fn test_click_inline_by_index_and_text() {
    let (client, controller) = setup();
    let response = chat_controller::Response::new(vec![menu_message(&client)]);
    let keyboard = &response.inline_keyboards()[0];

    let by_index = controller
        .click_inline(keyboard, 1usize, ClickOptions::default())
        .await
        .unwrap();
    let by_text = controller
        .click_inline(keyboard, "B", ClickOptions::default())
        .await
        .unwrap();

    assert!(by_index.answered);
    assert_eq!(by_index, by_text);
    let requests = client.callback_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], ("b".to_string(), ms(10_100)));
    assert_eq!(requests[1].0, "b");
}

/// **Test: URL buttons are "not clickable", missing buttons are "not found".**
#[tokio::test(start_paused = true)]
async fn test_click_inline_resolution_errors() {
    let (client, controller) = setup();
    let response = chat_controller::Response::new(vec![menu_message(&client)]);
    let keyboard = &response.inline_keyboards()[0];

    let err = controller
        .click_inline(keyboard, "Website", ClickOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProbeError::NotClickable { reason: NotClickableReason::Url(_), .. }
    ));

    let err = controller
        .click_inline(keyboard, "Inert", ClickOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProbeError::NotClickable { reason: NotClickableReason::NoCallbackData, .. }
    ));

    let err = controller
        .click_inline(keyboard, ButtonSelector::Index(42), ClickOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::ButtonNotFound { .. }));
    assert!(client.callback_requests().is_empty());
}

/// **Test: an unanswered callback raises CallbackQueryTimeout unless allow_unanswered is set.**
#[tokio::test(start_paused = true)]
async fn test_click_inline_unanswered() {
    let (client, controller) = setup();
    client.on_callback("c", CallbackBehavior::Timeout, vec![]);
    let response = chat_controller::Response::new(vec![menu_message(&client)]);
    let keyboard = &response.inline_keyboards()[0];
    let options = ClickOptions {
        max_wait: ms(500),
        allow_unanswered: false,
    };

    let err = controller.click_inline(keyboard, "C", options).await.unwrap_err();
    match err {
        ProbeError::CallbackQueryTimeout {
            button_text,
            callback_data,
            timeout,
        } => {
            assert_eq!(button_text, "C");
            assert_eq!(callback_data, "c");
            assert_eq!(timeout, ms(500));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let lenient = ClickOptions {
        allow_unanswered: true,
        ..options
    };
    let result = controller.click_inline(keyboard, "C", lenient).await.unwrap();
    assert!(!result.answered);
    assert!(result.answer.is_none());
}

/// **Test: non-timeout adapter failures propagate unchanged, even with allow_unanswered.**
#[tokio::test(start_paused = true)]
async fn test_click_inline_other_failure_propagates() {
    let (client, controller) = setup();
    client.on_callback("a", CallbackBehavior::Fail("FLOOD".to_string()), vec![]);
    let response = chat_controller::Response::new(vec![menu_message(&client)]);
    let keyboard = &response.inline_keyboards()[0];
    let options = ClickOptions {
        allow_unanswered: true,
        ..Default::default()
    };

    let err = controller.click_inline(keyboard, "A", options).await.unwrap_err();
    assert!(matches!(err, ProbeError::Adapter(AdapterError::Network(ref r)) if r == "FLOOD"));
}

/// **Test: wrapping a click in collect captures the messages it triggers.**
#[tokio::test(start_paused = true)]
async fn test_click_inside_collect() {
    let (client, controller) = setup();
    let answer = CallbackAnswer {
        message: Some("Correct!".to_string()),
        ..Default::default()
    };
    client.on_callback(
        "a",
        CallbackBehavior::Answer(answer),
        vec![ScriptedReply::after(ms(30), client.message("Next question"))],
    );
    let menu = chat_controller::Response::new(vec![menu_message(&client)]);
    let keyboard = menu.inline_keyboards().remove(0);
    let ctl = &controller;
    let kb = &keyboard;

    let response = controller
        .collect(&TerminationPolicy::new().min(1), || async move {
            let result = ctl.click_inline(kb, "A", ClickOptions::default()).await?;
            assert_eq!(result.answer.unwrap().message.as_deref(), Some("Correct!"));
            Ok::<_, ProbeError>(())
        })
        .await
        .unwrap();

    assert_eq!(response.full_text(), "Next question");
}

/// **Test: clicking a reply button sends its label and returns the resulting turn.**
#[tokio::test(start_paused = true)]
async fn test_click_reply() {
    let (client, controller) = setup();
    let prompt = client
        .message("Ready?")
        .with_markup(KeyboardMarkup::Reply(vec![vec![Button::text("Yes"), Button::text("No")]]));
    client.on_text("Yes", vec![ScriptedReply::after(ms(40), client.message("Go!"))]);
    let keyboard = chat_controller::Response::new(vec![prompt])
        .reply_keyboard()
        .unwrap();

    let response = controller
        .click_reply(&keyboard, "Yes", &TerminationPolicy::new().min(1))
        .await
        .unwrap();

    assert_eq!(client.sent_texts(), vec!["Yes"]);
    assert_eq!(response.full_text(), "Go!");

    let err = controller
        .click_reply(&keyboard, "Maybe", &TerminationPolicy::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::ButtonNotFound { .. }));
}

fn inline_result(id: &str) -> InlineResult {
    InlineResult {
        id: id.to_string(),
        query_id: 77,
        result_type: "article".to_string(),
        title: Some(format!("Result {}", id)),
        description: None,
        url: None,
    }
}

fn page(ids: &[&str], next: Option<&str>) -> InlineResultPage {
    InlineResultPage {
        query_id: 77,
        results: ids.iter().map(|id| inline_result(id)).collect(),
        next_offset: next.map(str::to_string),
        is_gallery: false,
        switch_pm: None,
    }
}

/// **Test: inline query pagination stops at the limit or when the bot has no more pages.**
#[tokio::test(start_paused = true)]
async fn test_inline_query_pagination() {
    let (client, controller) = setup();
    client.add_inline_page("", page(&["1", "2"], Some("a")));
    client.add_inline_page("a", page(&["3", "4"], Some("b")));
    client.add_inline_page("b", page(&["5"], None));

    let limited = controller
        .inline_query(
            "cats",
            InlineQueryOptions {
                limit: 3,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<&str> = limited.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(client.inline_requests(), vec!["", "a"]);

    let all = controller
        .inline_query("cats", InlineQueryOptions::default())
        .await
        .unwrap();
    assert_eq!(all.count(), 5);
    assert_eq!(all.next_offset, None);
}

#[tokio::test(start_paused = true)]
async fn test_inline_query_repeated_offset_and_invalid_limit() {
    let (client, controller) = setup();
    client.add_inline_page("", page(&["1"], Some("x")));
    client.add_inline_page("x", page(&["2"], Some("x")));

    let container = controller
        .inline_query("dogs", InlineQueryOptions::default())
        .await
        .unwrap();
    assert_eq!(container.count(), 2);
    assert_eq!(client.inline_requests(), vec!["", "x"]);

    let err = controller
        .inline_query(
            "dogs",
            InlineQueryOptions {
                limit: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn test_switch_to_pm() {
    let (client, controller) = setup();
    let mut first = page(&["1"], None);
    first.switch_pm = Some(SwitchPmOffer {
        text: "Open bot".to_string(),
        start_param: "ref42".to_string(),
    });
    client.add_inline_page("", first);

    let container = controller
        .inline_query("x", InlineQueryOptions::default())
        .await
        .unwrap();
    assert!(container.can_switch_pm());
    controller.switch_to_pm(&container).await.unwrap();
    assert_eq!(client.sent_texts(), vec!["/start ref42"]);

    let mut without = container.clone();
    without.switch_pm = None;
    assert!(matches!(
        controller.switch_to_pm(&without).await,
        Err(ProbeError::InvalidArgument(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_send_inline_result() {
    let (client, controller) = setup();
    client.on_inline_result(vec![ScriptedReply::after(ms(15), client.message("Result 1"))]);
    let result = inline_result("1");

    let message = controller.send_inline_result(&result, None).await.unwrap();
    assert_eq!(message.text.as_deref(), Some("Result 1"));
    let sent = client.sent_inline_results();
    assert_eq!(sent[0].chat_id, BOT_ID);
    assert_eq!(sent[0].query_id, 77);

    client.on_inline_result(vec![]);
    let err = controller.send_inline_result(&result, None).await.unwrap_err();
    assert!(matches!(err, ProbeError::InlineResultNotDelivered { .. }));
}

/// **Test: an inline result sent to another chat is collected from that chat.**
///
/// **Setup:** after the result is sent, a message lands in chat 999 and another in the peer chat.
/// **Action:** send_inline_result(&result, Some(999)).
/// **Expected:** the chat-999 message is returned; the result was posted to chat 999.
#[tokio::test(start_paused = true)]
async fn test_send_inline_result_to_other_chat() {
    let (client, controller) = setup();
    client.on_inline_result(vec![
        ScriptedReply::after(ms(10), client.message("Peer chatter")),
        ScriptedReply::after(ms(20), IncomingMessage::text(999, 50, "Result in group")),
    ]);
    let result = inline_result("1");

    let message = controller.send_inline_result(&result, Some(999)).await.unwrap();

    assert_eq!(message.chat_id, 999);
    assert_eq!(message.text.as_deref(), Some("Result in group"));
    assert_eq!(client.sent_inline_results()[0].chat_id, 999);
    assert_eq!(client.listener_count(), 0);
}
