use tracing::{Instrument, info, instrument};

use crate::base::{
    prompts,
    types::{MentionEvent, Void},
};

use super::{InteractionContext, text::strip_mention};

#[instrument(skip_all)]
pub fn handle_app_mention(event: MentionEvent, context: InteractionContext) {
    tokio::spawn(async move {
        process_app_mention(&event, &context).in_current_span().await;
    });
}

/// Answer a mention in its thread; a bare mention gets a plain greeting.
#[instrument(skip_all, fields(channel = %event.channel, user = %event.user))]
pub async fn process_app_mention(event: &MentionEvent, context: &InteractionContext) {
    if let Err(err) = process_app_mention_internal(event, context).await {
        context.apologize(&event.channel, Some(&event.ts), &err).await;
    }
}

async fn process_app_mention_internal(event: &MentionEvent, context: &InteractionContext) -> Void {
    let text = strip_mention(&event.text);

    if text.is_empty() {
        info!("Mention carried no question; greeting.");
        return context.chat.send_message(&event.channel, None, prompts::GREETING).await;
    }

    context.chat.send_ephemeral(&event.channel, &event.user, Some(&event.ts), prompts::PROCESSING).await?;

    let answer = context.ask(&event.channel, &event.user, &text).await?;

    context.chat.send_message(&event.channel, Some(&event.ts), &answer).await
}
