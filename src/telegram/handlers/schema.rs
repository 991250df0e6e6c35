//! Dispatcher schema and handler chain builders
//!
//! Branches are evaluated in registration order and the first match wins:
//!
//! 1. owner commands (`/dl`, `/ul`, `/restart`) from the owner
//! 2. every other command
//! 3. passive messages accepted by [`message_route`]
//! 4. callback queries
//! 5. inline queries and chosen inline results

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{ChosenInlineResult, InlineQuery, Message};

use super::callbacks::handle_callback;
use super::commands::handle_command;
use super::inline::{handle_chosen_inline_result, handle_inline_query};
use super::messages::handle_passive;
use super::owner::{handle_owner_command, is_owner_command};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::{parse_command, Command};
use crate::telegram::filters::{is_owner, message_route, MessageRoute, MessageTraits};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(owner_command_handler(deps.clone()))
        .branch(command_handler(deps.clone()))
        .branch(message_handler(deps.clone()))
        .branch(callback_handler(deps.clone()))
        .branch(inline_query_handler(deps.clone()))
        .branch(chosen_inline_handler(deps))
}

fn owner_command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let username = deps.bot_username.clone();
    let owner_id = deps.config.owner_id;

    Update::filter_message()
        .filter(move |msg: Message| is_owner(&msg, owner_id))
        .filter_map(move |msg: Message| {
            parse_command(msg.text().unwrap_or_default(), &username).filter(is_owner_command)
        })
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move { handle_owner_command(&bot, &msg, &deps, cmd).await }
        })
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let username = deps.bot_username.clone();

    Update::filter_message()
        .filter_map(move |msg: Message| parse_command(msg.text().unwrap_or_default(), &username))
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move { handle_command(&bot, &msg, &deps, cmd).await }
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_map(|msg: Message| {
            let text = msg.text()?;
            message_route(text, MessageTraits::of(&msg))
        })
        .endpoint(move |bot: Bot, msg: Message, route: MessageRoute| {
            let deps = deps.clone();
            async move {
                handle_passive(&bot, &msg, &deps, route).await;
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_callback(bot, q, deps).await {
                log::error!("Callback handler failed: {}", e);
            }
            Ok(())
        }
    })
}

fn inline_query_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_inline_query().endpoint(move |bot: Bot, q: InlineQuery| {
        let deps = deps.clone();
        async move { handle_inline_query(bot, q, deps).await }
    })
}

fn chosen_inline_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_chosen_inline_result().endpoint(move |bot: Bot, chosen: ChosenInlineResult| {
        let deps = deps.clone();
        async move { handle_chosen_inline_result(bot, chosen, deps).await }
    })
}
