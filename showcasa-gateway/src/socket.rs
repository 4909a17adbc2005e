use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;
use uuid::Uuid;

use showcasa_shared::types::auth::Claims;
use showcasa_shared::types::event::socket_events;

use crate::config::AuthMode;
use crate::errors::GatewayError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Delivery group of one user. Every connection of the user joins it.
pub fn user_room(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let mut split = pair.splitn(2, '=');
        let key = split.next()?;
        let value = split.next()?;
        (key == name && !value.is_empty()).then_some(value)
    })
}

/// Establish the user identity of a connecting socket from its handshake
/// query string.
pub fn resolve_identity(query: Option<&str>, mode: AuthMode, jwt_secret: &str) -> Result<Uuid, GatewayError> {
    let query = query.unwrap_or_default();

    let raw = query_param(query, "userId").ok_or(GatewayError::MissingIdentity)?;
    let user_id = Uuid::parse_str(raw).map_err(|_| GatewayError::InvalidIdentity(raw.to_string()))?;

    if mode == AuthMode::Token {
        let token = query_param(query, "token").ok_or(GatewayError::MissingToken)?;
        let claims = Claims::decode(token, jwt_secret).map_err(GatewayError::TokenRejected)?;
        if claims.sub != user_id {
            return Err(GatewayError::IdentityMismatch);
        }
    }

    Ok(user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub users: usize,
    pub connections: usize,
}

/// Identified connections and distinct users currently on the default namespace.
pub fn connection_stats(io: &SocketIo) -> Result<ConnectionStats, GatewayError> {
    let sockets = io.sockets().map_err(|e| GatewayError::Adapter(e.to_string()))?;
    let identities: Vec<Uuid> = sockets
        .iter()
        .filter_map(|socket| socket.extensions.get::<Uuid>())
        .collect();
    let users: HashSet<Uuid> = identities.iter().copied().collect();

    Ok(ConnectionStats {
        users: users.len(),
        connections: identities.len(),
    })
}

pub async fn on_connect(socket: SocketRef, state: Arc<AppState>) {
    let identity = resolve_identity(
        socket.req_parts().uri.query(),
        state.config.auth_mode,
        &state.config.jwt_secret,
    );

    let user_id = match identity {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(sid = %socket.id, error = %e, "rejecting socket connection");
            metrics::counter!("gateway_rejected_connections_total").increment(1);
            let _ = socket.emit(
                socket_events::ERROR,
                &ErrorPayload {
                    code: e.code().into(),
                    message: e.to_string(),
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(user_id);

    // Leaving the room is implicit on disconnect.
    if let Err(e) = socket.join(user_room(user_id)) {
        tracing::error!(user_id = %user_id, error = %e, "could not join delivery group");
        socket.disconnect().ok();
        return;
    }

    metrics::counter!("gateway_connections_total").increment(1);
    metrics::gauge!("gateway_connections").increment(1.0);
    tracing::info!(user_id = %user_id, sid = %socket.id, "socket joined delivery group");

    socket.on_disconnect(move |socket: SocketRef| async move {
        metrics::gauge!("gateway_connections").decrement(1.0);
        tracing::info!(user_id = %user_id, sid = %socket.id, "socket left delivery group");
    });
}
