use salvo::affix_state;
use salvo::prelude::*;

use super::handlers::{get_message, health_check, list_channels, list_guilds, list_messages, stats};
use super::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .hoop(affix_state::inject(state))
        .push(Router::with_path("health").get(health_check))
        .push(
            Router::with_path("api")
                .push(
                    Router::with_path("messages")
                        .get(list_messages)
                        .push(Router::with_path("{id}").get(get_message)),
                )
                .push(Router::with_path("channels").get(list_channels))
                .push(Router::with_path("guilds").get(list_guilds))
                .push(Router::with_path("stats").get(stats)),
        )
}
