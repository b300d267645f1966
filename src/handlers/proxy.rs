use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::error::AppError;
use crate::gateway::normalize_path;

/// Handle `GET /api/{upstream}/*path`
///
/// The remainder of the raw request path, plus any query string, is forwarded
/// as-is so percent-encoding survives the hop.
pub async fn forward(State(state): State<AppState>, uri: Uri) -> Result<Response, AppError> {
    let path = upstream_path(&state.proxy_prefix, &uri);
    let proxied = state.proxy.handle(&path).await?;

    let status = StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, [(header::CONTENT_TYPE, proxied.content_type)], proxied.body).into_response())
}

fn upstream_path(prefix: &str, uri: &Uri) -> String {
    let rest = uri.path().strip_prefix(prefix).unwrap_or_default();
    let mut path = normalize_path(rest);
    if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_for(uri: &str) -> String {
        upstream_path("/api/jikan", &uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_upstream_path() {
        assert_eq!(path_for("/api/jikan/anime/1"), "/anime/1");
        assert_eq!(path_for("/api/jikan"), "/");
        assert_eq!(path_for("/api/jikan/"), "/");
        assert_eq!(path_for("/api/jikan/anime?q=bebop&page=2"), "/anime?q=bebop&page=2");
        assert_eq!(path_for("/api/jikan/anime?"), "/anime");
    }

    #[test]
    fn test_upstream_path_keeps_encoding() {
        assert_eq!(path_for("/api/jikan/anime?q=cowboy%20bebop"), "/anime?q=cowboy%20bebop");
    }
}
