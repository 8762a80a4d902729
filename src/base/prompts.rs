//! Fixed prompt text for the assistant.

/// Role-defining system directive sent with every generic query.
pub const ASSISTANT_SYSTEM_DIRECTIVE: &str = r#####"
You are a helpful personal assistant with the following capabilities:

1. Email Management:
   - Read emails from Gmail
   - Filter emails by various criteria (unread, sender, etc.)
   - Summarize email contents

2. Calendar Management:
   - View upcoming calendar events
   - Create new calendar events
   - Schedule meetings with attendees

Your goal is to help the user manage their schedule and communications efficiently.
Be proactive, concise, and helpful. When scheduling meetings, always confirm details
like time, duration, and attendees before creating events.

Always provide clear summaries and actionable insights from emails and calendar events.

You are talking to the user through Slack, so use Slack's markdown formatting (`*bold*`, `_italics_`, bullet lists).
Slack does not render math or tables, so do not use them.
"#####;

/// Reply to a mention that carries no text besides the mention itself.
pub const GREETING: &str = "Hi! How can I assist you today?";

/// Threaded acknowledgment posted while a mention is processed.
pub const PROCESSING: &str = "Processing your request...";

/// Help listing for an empty slash command.
pub const COMMAND_HELP: &str = "*Available commands:*\n\
• `/assistant emails` - Check recent unread emails\n\
• `/assistant calendar` - View upcoming events\n\
• `/assistant [question]` - Ask any question";

/// Reply when the `emails` subcommand has nothing to show.
pub const NO_EMAILS: &str = "No unread emails found or unable to access Gmail.";

/// Reply when the `calendar` subcommand has nothing to show.
pub const NO_EVENTS: &str = "No upcoming events found or unable to access Calendar.";

/// Build the apology sent when a handler fails.
pub fn apology(message: &str) -> String {
    format!("Sorry, I encountered an error: {message}")
}
