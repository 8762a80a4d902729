use tracing::{Instrument, debug, instrument};

use crate::base::types::{DirectMessageEvent, Void};

use super::{InteractionContext, text::direct_message_text};

#[instrument(skip_all)]
pub fn handle_direct_message(event: DirectMessageEvent, context: InteractionContext) {
    tokio::spawn(async move {
        process_direct_message(&event, &context).in_current_span().await;
    });
}

/// Answer a direct message in the same channel, unthreaded.
///
/// Messages outside direct-message channels, from bots, or carrying a
/// subtype are ignored without any outbound call.
#[instrument(skip_all, fields(channel = %event.channel))]
pub async fn process_direct_message(event: &DirectMessageEvent, context: &InteractionContext) {
    let Some(text) = direct_message_text(event) else {
        debug!("Ignoring message that is not a plain direct message.");
        return;
    };

    if let Err(err) = process_direct_message_internal(event, text, context).await {
        context.apologize(&event.channel, None, &err).await;
    }
}

async fn process_direct_message_internal(event: &DirectMessageEvent, text: &str, context: &InteractionContext) -> Void {
    let user = event.user.as_deref().unwrap_or(&event.channel);
    let answer = context.ask(&event.channel, user, text).await?;

    context.chat.send_message(&event.channel, None, &answer).await
}
