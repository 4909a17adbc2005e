pub mod chats;
pub mod comments;
pub mod follows;
pub mod health;
pub mod likes;
pub mod messages;
pub mod notifications;

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use showcasa_shared::types::auth::Claims;
    use showcasa_shared::types::event::channels;

    use crate::test_support::Harness;

    fn bearer(user_id: uuid::Uuid) -> String {
        let token = Claims::new(user_id, 3600).encode("test-secret").unwrap();
        format!("Bearer {token}")
    }

    async fn send(h: &Harness, method: Method, uri: &str, auth: Option<String>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = crate::router(h.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_requests_without_token_are_rejected() {
        let h = Harness::new();
        let (status, body) = send(&h, Method::GET, "/notifications", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_like_route_is_idempotent_and_notifies_artist() {
        let h = Harness::new();
        let artist = h.user("mara");
        let fan = h.user("jules");
        let artwork = h.artwork(&artist, "Dusk");
        let uri = format!("/artworks/{}/like", artwork.id);

        let (status, body) = send(&h, Method::POST, &uri, Some(bearer(fan.id)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "applied");

        let (_, body) = send(&h, Method::POST, &uri, Some(bearer(fan.id)), None).await;
        assert_eq!(body["data"]["status"], "unchanged");

        let (_, body) = send(&h, Method::GET, &uri, Some(bearer(fan.id)), None).await;
        assert_eq!(body["data"]["hasLiked"], true);

        assert_eq!(h.reload_artwork(&artwork).like_count, 1);
        assert_eq!(h.broker.published_on(channels::NEW_NOTIFICATION).len(), 1);
    }

    #[tokio::test]
    async fn test_chat_flow_over_http() {
        let h = Harness::new();
        let ada = h.user("ada");
        let bo = h.user("bo");

        let (status, body) = send(
            &h,
            Method::POST,
            "/chats",
            Some(bearer(ada.id)),
            Some(json!({ "userId": bo.id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let chat_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &h,
            Method::POST,
            &format!("/chats/{chat_id}/messages"),
            Some(bearer(ada.id)),
            Some(json!({ "content": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["content"], "hi");

        let (_, body) = send(&h, Method::GET, "/messages/unread-count", Some(bearer(bo.id)), None).await;
        assert_eq!(body["data"]["totalUnread"], 1);

        let (status, _) = send(&h, Method::POST, &format!("/chats/{chat_id}/read"), Some(bearer(bo.id)), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&h, Method::GET, "/messages/unread-count", Some(bearer(bo.id)), None).await;
        assert_eq!(body["data"]["totalUnread"], 0);

        let (_, body) = send(
            &h,
            Method::GET,
            &format!("/chats/{chat_id}/messages?page=1&per_page=10"),
            Some(bearer(bo.id)),
            None,
        )
        .await;
        assert_eq!(body["data"]["total"], 1);
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_chat() {
        let h = Harness::new();
        let ada = h.user("ada");
        let bo = h.user("bo");
        let eve = h.user("eve");

        let (_, body) = send(&h, Method::POST, "/chats", Some(bearer(ada.id)), Some(json!({ "userId": bo.id }))).await;
        let chat_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(&h, Method::GET, &format!("/chats/{chat_id}"), Some(bearer(eve.id)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_empty_comment_is_a_validation_error() {
        let h = Harness::new();
        let artist = h.user("mara");
        let artwork = h.artwork(&artist, "Dusk");

        let (status, body) = send(
            &h,
            Method::POST,
            &format!("/artworks/{}/comments", artwork.id),
            Some(bearer(artist.id)),
            Some(json!({ "content": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E0002");
        assert!(!body["error"]["details"]["content"].is_null());
    }

    #[tokio::test]
    async fn test_follower_and_comment_lists_are_public() {
        let h = Harness::new();
        let artist = h.user("mara");
        let fan = h.user("jules");
        let artwork = h.artwork(&artist, "Dusk");
        crate::services::follows::follow(&h.state, fan.id, artist.id).await.unwrap();

        let (status, body) = send(&h, Method::GET, &format!("/users/{}/followers", artist.id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["username"], "jules");

        let (status, _) = send(&h, Method::GET, &format!("/users/{}/following", fan.id), None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&h, Method::GET, &format!("/artworks/{}/comments", artwork.id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));

        let (status, _) = send(&h, Method::GET, &format!("/users/{}/follow", artist.id), None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let h = Harness::new();
        let (status, body) = send(&h, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "showcasa-api");
        assert_eq!(body["checks"][0]["status"], "healthy");
    }
}
