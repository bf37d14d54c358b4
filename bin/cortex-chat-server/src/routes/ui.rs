//! Server-rendered chat page.
//!
//! Every handler rebuilds a [`ChatSession`] for the request, so a page always
//! shows exactly what the store holds. The model and temperature travel
//! with each form as plain fields.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Form, Router};
use cortex_chat_core::CortexModel;
use minijinja::context;
use tracing::debug;

use crate::entities::MessageStore;
use crate::error::ServerError;
use crate::schemas::ui::{
    ConversationOption, MessageView, OpenConversationQuery, PageQuery, SendMessageForm,
};
use crate::session::{ChatSession, GenerationParams};
use crate::state::AppState;
use crate::templates::CHAT_PAGE;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/chat/new", get(new_chat))
        .route("/chat/open", get(open_chat))
        .route("/chat/{id}", get(show_chat).post(post_message))
}

/// Open the most recent conversation, or a fresh one when none is stored.
async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ServerError> {
    let params = state.generation_params(query.model, query.temperature);
    let conversations = state.store.list_conversations().await?;
    let session = match conversations.first() {
        Some(latest) => ChatSession::load(state.store.as_ref(), &latest.conversation_id).await?,
        None => ChatSession::new(),
    };
    render(&state, &session, &params).await
}

async fn new_chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ServerError> {
    let params = state.generation_params(query.model, query.temperature);
    render(&state, &ChatSession::new(), &params).await
}

async fn open_chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenConversationQuery>,
) -> Result<Html<String>, ServerError> {
    let params = state.generation_params(query.model, query.temperature);
    let session = ChatSession::load(state.store.as_ref(), query.conversation_id).await?;
    render(&state, &session, &params).await
}

async fn show_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ServerError> {
    let params = state.generation_params(query.model, query.temperature);
    let session = ChatSession::load(state.store.as_ref(), id).await?;
    render(&state, &session, &params).await
}

/// Submit the message box. A blank message only re-renders the page.
async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<SendMessageForm>,
) -> Result<Html<String>, ServerError> {
    let params = state.generation_params(form.model, form.temperature);
    let mut session = ChatSession::load(state.store.as_ref(), id).await?;

    if form.content.trim().is_empty() {
        debug!("blank message ignored");
    } else {
        session
            .send(state.store.as_ref(), &state.completion, &params, &form.content)
            .await?;
    }
    render(&state, &session, &params).await
}

async fn render(
    state: &AppState,
    session: &ChatSession,
    params: &GenerationParams,
) -> Result<Html<String>, ServerError> {
    let conversations: Vec<ConversationOption> = state
        .store
        .list_conversations()
        .await?
        .iter()
        .map(Into::into)
        .collect();
    let messages: Vec<MessageView> = session.visible_messages().map(Into::into).collect();

    let mut models = CortexModel::ids();
    if !models.contains(&params.model) {
        models.insert(0, params.model.clone());
    }

    let html = state.templates.get_template(CHAT_PAGE)?.render(context! {
        conversation_id => session.conversation_id(),
        model => &params.model,
        temperature => params.temperature.to_string(),
        models => models,
        conversations => conversations,
        messages => messages,
    })?;
    Ok(Html(html))
}
