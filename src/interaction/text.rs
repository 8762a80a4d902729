//! Parsing inbound text and rendering capability results for chat.

use std::sync::OnceLock;

use regex::Regex;

use crate::base::{
    prompts,
    types::{CapabilityResult, DirectMessageEvent, EventList, MessageList},
};

static LEADING_MENTIONS: OnceLock<Regex> = OnceLock::new();

fn leading_mentions() -> &'static Regex {
    LEADING_MENTIONS.get_or_init(|| Regex::new(r"^(?:\s*<@[A-Z0-9]+>)+").unwrap())
}

/// Remove the leading user-mention token(s) and trim.
///
/// Only the mentions addressing the bot at the start are removed. Mentions
/// later in the text are kept, since they usually name people the question
/// is about (`invite <@U999> to lunch`) and the model needs them.
pub fn strip_mention(text: &str) -> String {
    leading_mentions().replace(text, "").trim().to_string()
}

/// What a slash command asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Emails,
    Calendar,
    Ask(String),
}

/// Parse the trailing text of a slash command.
pub fn parse_command(text: Option<&str>) -> Command {
    let text = text.unwrap_or_default().trim();

    if text.is_empty() {
        Command::Help
    } else if text.eq_ignore_ascii_case("emails") {
        Command::Emails
    } else if text.eq_ignore_ascii_case("calendar") {
        Command::Calendar
    } else {
        Command::Ask(text.to_string())
    }
}

/// The text of a plain message the bot should answer, if any.
///
/// Only human-authored messages in direct-message channels qualify.
pub fn direct_message_text(event: &DirectMessageEvent) -> Option<&str> {
    if event.subtype.is_some() || event.bot_id.is_some() || event.channel_type.as_deref() != Some("im") {
        return None;
    }

    event.text.as_deref().filter(|text| !text.trim().is_empty())
}

/// Render the `emails` subcommand reply.
pub fn render_emails(result: &CapabilityResult<MessageList>) -> String {
    match result.success() {
        Some(list) if list.count > 0 => {
            let mut out = format!("You have {} unread emails:", list.count);
            for email in &list.emails {
                out.push_str(&format!("\n• *{}* from {}", email.subject, email.from));
            }
            out
        }
        _ => prompts::NO_EMAILS.to_string(),
    }
}

/// Render the `calendar` subcommand reply.
pub fn render_events(result: &CapabilityResult<EventList>) -> String {
    match result.success() {
        Some(list) if list.count > 0 => {
            let mut out = "Upcoming events:".to_string();
            for event in &list.events {
                out.push_str(&format!("\n• *{}* - {}", event.summary, event.start));
            }
            out
        }
        _ => prompts::NO_EVENTS.to_string(),
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::types::{MessageSummary, ScheduledEvent};

    #[test]
    fn test_strip_leading_mention() {
        assert_eq!(strip_mention("<@U123ABC> what's on my calendar"), "what's on my calendar");
        assert_eq!(strip_mention("  <@U1> <@U2>  hi  "), "hi");
        assert_eq!(strip_mention("<@U123ABC>"), "");
    }

    #[test]
    fn test_inner_mentions_are_kept() {
        assert_eq!(strip_mention("<@UBOT> invite <@U999> to lunch"), "invite <@U999> to lunch");
        assert_eq!(strip_mention("hello <@UBOT>"), "hello <@UBOT>");
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(None), Command::Help);
        assert_eq!(parse_command(Some("   ")), Command::Help);
        assert_eq!(parse_command(Some("EMAILS")), Command::Emails);
        assert_eq!(parse_command(Some(" Calendar ")), Command::Calendar);
        assert_eq!(parse_command(Some("emails please")), Command::Ask("emails please".to_string()));
        assert_eq!(parse_command(Some("schedule lunch")), Command::Ask("schedule lunch".to_string()));
    }

    #[test]
    fn test_direct_message_filter() {
        let accepted = DirectMessageEvent {
            channel: "D1".to_string(),
            channel_type: Some("im".to_string()),
            user: Some("U1".to_string()),
            text: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(direct_message_text(&accepted), Some("hello"));

        let in_channel = DirectMessageEvent {
            channel_type: Some("channel".to_string()),
            ..accepted.clone()
        };
        assert_eq!(direct_message_text(&in_channel), None);

        let from_bot = DirectMessageEvent {
            bot_id: Some("B1".to_string()),
            ..accepted.clone()
        };
        assert_eq!(direct_message_text(&from_bot), None);

        let edited = DirectMessageEvent {
            subtype: Some("message_changed".to_string()),
            ..accepted.clone()
        };
        assert_eq!(direct_message_text(&edited), None);

        let empty = DirectMessageEvent {
            text: Some(" ".to_string()),
            ..accepted
        };
        assert_eq!(direct_message_text(&empty), None);
    }

    #[test]
    fn test_render_emails() {
        let result = CapabilityResult::Success(MessageList::from(vec![MessageSummary {
            id: "m1".to_string(),
            subject: "Q3 report".to_string(),
            from: "cfo@example.com".to_string(),
            date: "Unknown".to_string(),
            snippet: String::new(),
        }]));

        assert_eq!(render_emails(&result), "You have 1 unread emails:\n• *Q3 report* from cfo@example.com");
        assert_eq!(render_emails(&CapabilityResult::Success(MessageList::default())), prompts::NO_EMAILS);
        assert_eq!(render_emails(&CapabilityResult::Error { message: "nope".to_string() }), prompts::NO_EMAILS);
    }

    #[test]
    fn test_render_events() {
        let result = CapabilityResult::Success(EventList::from(vec![ScheduledEvent {
            id: "e1".to_string(),
            summary: "Standup".to_string(),
            start: "2025-10-21T09:00:00Z".to_string(),
            end: "2025-10-21T09:15:00Z".to_string(),
            location: String::new(),
            description: String::new(),
            attendees: None,
        }]));

        assert_eq!(render_events(&result), "Upcoming events:\n• *Standup* - 2025-10-21T09:00:00Z");
        assert_eq!(render_events(&CapabilityResult::Error { message: "nope".to_string() }), prompts::NO_EVENTS);
    }
}
