use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::MessageStore;
use crate::error::ServerError;
use crate::schemas::conversation::{
    ConversationResponse, CreateConversationResponse, MessageResponse, SendMessageRequest,
    SendMessageResponse,
};
use crate::session::ChatSession;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_conversations, create_conversation, list_messages, send_message),
    components(schemas(
        ConversationResponse,
        CreateConversationResponse,
        MessageResponse,
        SendMessageRequest,
        SendMessageResponse
    ))
)]
pub struct ConversationsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(list_messages).post(send_message),
        )
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    responses(
        (status = 200, description = "Stored conversations, newest first", body = Vec<ConversationResponse>),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ConversationResponse>>, ServerError> {
    let conversations = state.store.list_conversations().await?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

/// Allocate a conversation id. Nothing is stored until the first message.
#[utoipa::path(
    post,
    path = "/api/conversations",
    tag = "conversations",
    responses(
        (status = 200, description = "New conversation id", body = CreateConversationResponse),
    )
)]
pub async fn create_conversation() -> Json<CreateConversationResponse> {
    let session = ChatSession::new();
    Json(CreateConversationResponse {
        conversation_id: session.conversation_id().to_owned(),
    })
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages in chronological order", body = Vec<MessageResponse>),
        (status = 500, description = "Database error"),
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageResponse>>, ServerError> {
    let messages = state.store.read_ordered(&id).await?;
    Ok(Json(messages.iter().map(MessageResponse::from).collect()))
}

/// Send one user message and return the assistant reply.
///
/// A failed completion still answers 200: the error text is the reply
/// content and `error` is `true`.
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Assistant reply", body = SendMessageResponse),
        (status = 400, description = "Empty message"),
        (status = 500, description = "Database error"),
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ServerError> {
    if req.content.trim().is_empty() {
        return Err(ServerError::BadRequest("message content is empty".into()));
    }
    let params = state.generation_params(req.model, req.temperature);

    let mut session = ChatSession::load(state.store.as_ref(), id).await?;
    let reply = session
        .send(state.store.as_ref(), &state.completion, &params, &req.content)
        .await?;

    Ok(Json(SendMessageResponse {
        role: reply.message.role.to_string(),
        content: reply.message.content,
        error: reply.failed,
    }))
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::routes;
    use crate::session::test::FixedService;
    use crate::state::test_state;

    async fn call(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn send_then_read_back() {
        let service = FixedService::ok("Paris.");
        let state = test_state(service.clone()).await;
        let app = routes::build(state);

        let (status, body) = call(
            app.clone(),
            post_json(
                "/api/conversations/c1/messages",
                json!({ "content": "Capitale de la France ?", "model": "llama3-8b" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "role": "assistant", "content": "Paris.", "error": false }));

        let (status, body) = call(
            app.clone(),
            Request::get("/api/conversations/c1/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                { "role": "user", "content": "Capitale de la France ?" },
                { "role": "assistant", "content": "Paris." },
            ])
        );

        let (_, body) = call(
            app,
            Request::get("/api/conversations").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(
            body,
            json!([{ "conversation_id": "c1", "title": "Capitale de la France ?" }])
        );
        assert!(service.prompts.lock().unwrap()[0].contains("Utilisateur: Capitale de la France ?"));
    }

    #[tokio::test]
    async fn second_message_sees_stored_history() {
        let service = FixedService::ok("ok");
        let app = routes::build(test_state(service.clone()).await);

        for text in ["un", "deux"] {
            let (status, _) = call(
                app.clone(),
                post_json("/api/conversations/c2/messages", json!({ "content": text })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let prompts = service.prompts.lock().unwrap();
        assert!(prompts[1].contains("Utilisateur: un\nAssistant: ok\nUtilisateur: deux"));
    }

    #[tokio::test]
    async fn completion_failure_is_reported_in_the_body() {
        let app = routes::build(test_state(FixedService::failing("no warehouse")).await);

        let (status, body) = call(
            app,
            post_json("/api/conversations/c3/messages", json!({ "content": "Hello" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], true);
        assert_eq!(body["content"], "❌ Erreur Cortex : no warehouse");
    }

    #[tokio::test]
    async fn blank_message_is_rejected_and_not_stored() {
        let service = FixedService::ok("unused");
        let state = test_state(service.clone()).await;
        let app = routes::build(state);

        let (status, body) = call(
            app.clone(),
            post_json("/api/conversations/c4/messages", json!({ "content": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("empty"));
        assert!(service.prompts.lock().unwrap().is_empty());

        let (_, body) = call(
            app,
            Request::get("/api/conversations/c4/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn created_ids_are_fresh_uuids() {
        let app = routes::build(test_state(FixedService::ok("x")).await);
        let req = || Request::post("/api/conversations").body(Body::empty()).unwrap();

        let (_, a) = call(app.clone(), req()).await;
        let (_, b) = call(app, req()).await;

        let a = a["conversation_id"].as_str().unwrap().to_owned();
        let b = b["conversation_id"].as_str().unwrap().to_owned();
        assert!(uuid::Uuid::parse_str(&a).is_ok());
        assert_ne!(a, b);
    }
}
