use salvo::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::attachments::FileType;
use crate::db::filter::{MessageQuery, Pagination, SortColumn, SortOrder};
use crate::db::queries::MessageRecord;
use crate::error::ApiError;
use crate::web::AppState;

#[derive(Serialize)]
struct PaginationInfo {
    page: u32,
    per_page: u32,
    total: i64,
    pages: i64,
}

#[derive(Serialize)]
struct SortingInfo {
    sort_by: &'static str,
    sort_order: &'static str,
}

#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<MessageRecord>,
    pagination: PaginationInfo,
    sorting: SortingInfo,
}

fn app_state(depot: &Depot) -> Result<AppState, ApiError> {
    depot
        .obtain::<AppState>()
        .cloned()
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("application state is not configured")))
}

/// Reads `/messages` options. Invalid values are coerced, never rejected.
fn message_query(req: &mut Request, state: &AppState) -> MessageQuery {
    let sort_by = req.query::<String>("sort_by");
    let sort_order = req.query::<String>("sort_order");

    MessageQuery {
        search: req.query::<String>("search"),
        channel_id: req.query::<String>("channel_id"),
        guild_id: req.query::<String>("guild_id"),
        file_type: req
            .query::<String>("file_type")
            .and_then(|value| FileType::from_filter(&value)),
        sort_by: SortColumn::parse(sort_by.as_deref()),
        sort_order: SortOrder::parse(sort_order.as_deref()),
        pagination: Pagination::new(
            req.query::<i64>("page"),
            req.query::<i64>("per_page"),
            state.default_per_page,
            state.max_per_page,
        ),
    }
}

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({ "status": "ok" })));
}

#[handler]
pub async fn list_messages(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let state = match app_state(depot) {
        Ok(state) => state,
        Err(err) => return res.render(err),
    };

    let query = message_query(req, &state);
    let (sort_by, sort_order, pagination) = (query.sort_by, query.sort_order, query.pagination);

    match state.service.list_messages(query).await {
        Ok(page) => res.render(Json(MessagesResponse {
            pagination: PaginationInfo {
                page: pagination.page,
                per_page: pagination.per_page,
                total: page.total,
                pages: pagination.pages(page.total),
            },
            sorting: SortingInfo {
                sort_by: sort_by.as_str(),
                sort_order: sort_order.as_str(),
            },
            messages: page.messages,
        })),
        Err(err) => res.render(ApiError::from(err)),
    }
}

#[handler]
pub async fn get_message(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let state = match app_state(depot) {
        Ok(state) => state,
        Err(err) => return res.render(err),
    };

    let Some(id) = req.param::<i64>("id") else {
        return res.render(ApiError::NotFound("Message not found".to_string()));
    };

    match state.service.get_message(id).await {
        Ok(Some(message)) => res.render(Json(message)),
        Ok(None) => res.render(ApiError::NotFound("Message not found".to_string())),
        Err(err) => res.render(ApiError::from(err)),
    }
}

#[handler]
pub async fn list_channels(depot: &mut Depot, res: &mut Response) {
    match app_state(depot) {
        Ok(state) => {
            let channels_by_guild = state.service.channels_by_guild().await;
            res.render(Json(json!({ "channels_by_guild": channels_by_guild })));
        }
        Err(err) => res.render(err),
    }
}

#[handler]
pub async fn list_guilds(depot: &mut Depot, res: &mut Response) {
    match app_state(depot) {
        Ok(state) => {
            let guilds = state.service.guilds().await;
            res.render(Json(json!({ "guilds": guilds })));
        }
        Err(err) => res.render(err),
    }
}

#[handler]
pub async fn stats(depot: &mut Depot, res: &mut Response) {
    match app_state(depot) {
        Ok(state) => res.render(Json(state.service.stats().await)),
        Err(err) => res.render(err),
    }
}
