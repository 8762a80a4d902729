use chrono::Utc;
use tracing::{Instrument, info, instrument};

use crate::base::{
    prompts,
    types::{SlashCommandEvent, Void},
};

use super::{
    InteractionContext,
    text::{Command, parse_command, render_emails, render_events},
};

/// Items listed by the `emails` and `calendar` subcommands.
const LISTING_LIMIT: u32 = 5;

/// Filter used by the `emails` subcommand.
const UNREAD_FILTER: &str = "is:unread";

/// Process a slash command after it has been acknowledged.
#[instrument(skip_all)]
pub fn handle_slash_command(event: SlashCommandEvent, context: InteractionContext) {
    tokio::spawn(async move {
        process_slash_command(&event, &context).in_current_span().await;
    });
}

#[instrument(skip_all, fields(channel = %event.channel, user = %event.user))]
pub async fn process_slash_command(event: &SlashCommandEvent, context: &InteractionContext) {
    if let Err(err) = process_slash_command_internal(event, context).await {
        context.apologize(&event.channel, None, &err).await;
    }
}

async fn process_slash_command_internal(event: &SlashCommandEvent, context: &InteractionContext) -> Void {
    let command = parse_command(event.text.as_deref());
    info!("Slash command parsed as {:?}", command);

    let reply = match command {
        Command::Help => prompts::COMMAND_HELP.to_string(),
        Command::Emails => render_emails(&context.workspace.fetch_messages(LISTING_LIMIT, UNREAD_FILTER).await),
        Command::Calendar => render_events(&context.workspace.fetch_scheduled_events(LISTING_LIMIT, Some(Utc::now()), None).await),
        Command::Ask(question) => context.ask(&event.channel, &event.user, &question).await?,
    };

    context.chat.send_message(&event.channel, None, &reply).await
}
