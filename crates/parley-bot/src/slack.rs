//! Slack Socket Mode listener and thread reply poster (slack-morphism).

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use slack_morphism::prelude::*;

use crate::dispatcher::{Dispatcher, FileAttachment, InboundEvent, ReplyPoster};

/// Slack rejects longer message texts
pub const MAX_MESSAGE_LEN: usize = 4000;

/// State shared with socket mode callbacks via `SlackClientEventsUserState`.
#[derive(Clone)]
struct ListenerState {
    dispatcher: Arc<Dispatcher>,
}

/// Connect over Socket Mode and dispatch message events until Ctrl-C.
pub async fn run_socket_mode(
    client: Arc<SlackHyperClient>,
    app_token: &str,
    dispatcher: Arc<Dispatcher>,
) -> anyhow::Result<()> {
    let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

    let listener_environment = Arc::new(
        SlackClientEventsListenerEnvironment::new(client)
            .with_error_handler(slack_error_handler)
            .with_user_state(ListenerState { dispatcher }),
    );

    let listener = SlackClientSocketModeListener::new(
        &SlackClientSocketModeConfig::new(),
        listener_environment,
        callbacks,
    );

    let app_token = SlackApiToken::new(SlackApiTokenValue(app_token.to_string()));
    listener
        .listen_for(&app_token)
        .await
        .map_err(|error| anyhow::anyhow!("failed to start slack socket mode listener: {error}"))?;

    tracing::info!("Slack bot is running, listening for messages");

    tokio::select! {
        exit_code = listener.serve() => {
            tracing::info!(exit_code, "Slack socket mode listener stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down Slack socket mode listener");
            listener.shutdown().await;
        }
    }

    Ok(())
}

/// Must be a `fn` pointer, slack-morphism does not accept closures here.
async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    let message = match event.event {
        SlackEventCallbackBody::Message(message) => message,
        _ => return Ok(()),
    };

    let state = {
        let states = states.read().await;
        states.get_user_state::<ListenerState>().cloned()
    };
    let Some(state) = state else {
        tracing::error!("Listener state missing from socket mode user state");
        return Ok(());
    };

    let Some(inbound) = inbound_from_slack(&message) else {
        return Ok(());
    };

    // One task per event, acknowledged immediately
    tokio::spawn(async move {
        let outcome = state.dispatcher.dispatch(inbound).await;
        tracing::debug!(?outcome, "Event dispatched");
    });

    Ok(())
}

fn slack_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::warn!(error = %err, "Slack socket mode error");
    HttpStatusCode::OK
}

/// `None` for events without a channel
pub fn inbound_from_slack(message: &SlackMessageEvent) -> Option<InboundEvent> {
    let channel = message.origin.channel.as_ref()?.0.clone();

    let subtype = message
        .subtype
        .as_ref()
        .and_then(|subtype| serde_json::to_value(subtype).ok())
        .and_then(|value| value.as_str().map(str::to_string));

    let (text, files) = match &message.content {
        Some(content) => {
            let files = content
                .files
                .iter()
                .flatten()
                .map(|file| FileAttachment {
                    mimetype: file
                        .mimetype
                        .as_ref()
                        .map(|mime| mime.0.clone())
                        .unwrap_or_default(),
                    url_private: file
                        .url_private
                        .as_ref()
                        .map(|url| url.to_string())
                        .unwrap_or_default(),
                })
                .collect();
            (content.text.clone(), files)
        }
        None => (None, Vec::new()),
    };

    Some(InboundEvent {
        subtype,
        bot_id: message.sender.bot_id.as_ref().map(|id| id.0.clone()),
        channel,
        ts: message.origin.ts.0.clone(),
        thread_ts: message.origin.thread_ts.as_ref().map(|ts| ts.0.clone()),
        text,
        files,
    })
}

/// Posts replies with `chat.postMessage`, in the thread of the triggering message
pub struct SlackReplyPoster {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
}

impl SlackReplyPoster {
    pub fn new(client: Arc<SlackHyperClient>, bot_token: impl Into<String>) -> Self {
        Self {
            client,
            token: SlackApiToken::new(SlackApiTokenValue(bot_token.into())),
        }
    }
}

#[async_trait]
impl ReplyPoster for SlackReplyPoster {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> anyhow::Result<()> {
        let session = self.client.open_session(&self.token);

        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let request = SlackApiChatPostMessageRequest::new(
                SlackChannelId(channel.to_string()),
                SlackMessageContent::new().with_text(chunk),
            )
            .with_thread_ts(SlackTs(thread_ts.to_string()));

            session
                .chat_post_message(&request)
                .await
                .context("failed to send slack thread reply")?;
        }

        Ok(())
    }
}

/// Split a message into chunks of at most `max_len` bytes.
/// Tries to split at newlines, then spaces, then hard-cuts on a char boundary.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }

        let window = &remaining[..cut];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&idx| idx > 0)
            .unwrap_or(cut);

        chunks.push(remaining[..split_at].to_string());
        // Drop only the separator; indentation on the next line is content
        remaining = if split_at < cut {
            &remaining[split_at + 1..]
        } else {
            &remaining[split_at..]
        };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_event(value: serde_json::Value) -> SlackMessageEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_inbound_maps_thread_and_text() {
        let message = message_event(json!({
            "channel": "C1",
            "ts": "1700000001.000200",
            "thread_ts": "1700000000.000100",
            "user": "U1",
            "text": "hello"
        }));

        let inbound = inbound_from_slack(&message).unwrap();
        assert_eq!(inbound.channel, "C1");
        assert_eq!(inbound.ts, "1700000001.000200");
        assert_eq!(inbound.thread_ts.as_deref(), Some("1700000000.000100"));
        assert_eq!(inbound.thread_id(), "1700000000.000100");
        assert_eq!(inbound.text.as_deref(), Some("hello"));
        assert!(inbound.subtype.is_none());
        assert!(!inbound.is_bot_authored());
    }

    #[test]
    fn test_inbound_bot_message_subtype() {
        let message = message_event(json!({
            "channel": "C1",
            "ts": "1.0",
            "subtype": "bot_message",
            "text": "from a bot"
        }));

        let inbound = inbound_from_slack(&message).unwrap();
        assert_eq!(inbound.subtype.as_deref(), Some("bot_message"));
        assert!(inbound.bot_id.is_none());
        assert!(inbound.is_bot_authored());
    }

    #[test]
    fn test_inbound_bot_id_without_subtype() {
        let message = message_event(json!({
            "channel": "C1",
            "ts": "1.0",
            "bot_id": "B123",
            "text": "from another app"
        }));

        let inbound = inbound_from_slack(&message).unwrap();
        assert!(inbound.subtype.is_none());
        assert_eq!(inbound.bot_id.as_deref(), Some("B123"));
        assert!(inbound.is_bot_authored());
    }

    #[test]
    fn test_inbound_maps_files() {
        let message = message_event(json!({
            "channel": "C1",
            "ts": "1.0",
            "user": "U1",
            "files": [
                {
                    "id": "F1",
                    "mimetype": "image/png",
                    "url_private": "https://files.slack.com/files-pri/T1-F1/a.png"
                },
                {
                    "id": "F2",
                    "mimetype": "application/pdf",
                    "url_private": "https://files.slack.com/files-pri/T1-F2/b.pdf"
                }
            ]
        }));

        let inbound = inbound_from_slack(&message).unwrap();
        assert!(inbound.text.is_none());
        assert_eq!(inbound.thread_id(), "1.0");
        assert_eq!(inbound.files.len(), 2);
        assert_eq!(inbound.files[0].mimetype, "image/png");
        assert_eq!(
            inbound.files[0].url_private,
            "https://files.slack.com/files-pri/T1-F1/a.png"
        );
        assert!(inbound.files[0].is_image());
        assert_eq!(inbound.files[1].mimetype, "application/pdf");
        assert!(!inbound.files[1].is_image());
    }

    #[test]
    fn test_inbound_without_channel_is_skipped() {
        let message = message_event(json!({
            "ts": "1.0",
            "user": "U1",
            "text": "orphan"
        }));

        assert!(inbound_from_slack(&message).is_none());
    }

    #[test]
    fn test_short_message_is_one_chunk() {
        assert_eq!(split_message("hello", 4000), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn test_split_falls_back_to_spaces() {
        let chunks = split_message("one two three four", 9);
        assert_eq!(chunks, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_split_keeps_leading_indentation() {
        let text = format!("{}\n    indented();", "a".repeat(30));
        let chunks = split_message(&text, 34);
        assert_eq!(chunks, vec!["a".repeat(30), "    indented();".to_string()]);
    }

    #[test]
    fn test_hard_cut_respects_char_boundaries() {
        let text = "é".repeat(10); // 2 bytes each
        let chunks = split_message(&text, 5);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 5 && !chunk.is_empty()));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunks_never_exceed_limit() {
        let text = "word ".repeat(2000);
        let chunks = split_message(&text, MAX_MESSAGE_LEN);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.len() <= MAX_MESSAGE_LEN));
    }
}
