// src/middleware/request.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::convert::Infallible;

use crate::{common::helpers::build_absolute_uri, config::AppState};

// Cabeçalho preenchido pelo proxy de autenticação na frente do serviço
const REMOTE_USER_HEADER: &str = "x-remote-user";
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestUser {
    pub username: String,
}

/// Os dados da requisição que chegam até o template da etiqueta.
#[derive(Debug, Clone, Serialize)]
pub struct LabelRequest {
    pub base_url: String,
    pub path: String,
    pub user: Option<RequestUser>,

    // Momento em que a requisição chegou. Fixo durante toda a renderização.
    #[serde(skip)]
    pub timestamp: NaiveDateTime,
}

impl LabelRequest {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, user: Option<RequestUser>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            user,
            timestamp: Local::now().naive_local(),
        }
    }

    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn build_absolute_uri(&self, path: &str) -> String {
        build_absolute_uri(&self.base_url, path)
    }
}

impl LabelRequest {
    /// Monta a requisição a partir dos headers.
    /// A URL base configurada (SITE_URL) tem prioridade sobre o header Host.
    pub fn from_parts(parts: &Parts, site_url: Option<&str>) -> Self {
        let base_url = match site_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = parts
                    .headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("localhost");
                let scheme = parts
                    .headers
                    .get(FORWARDED_PROTO_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("http");
                format!("{}://{}", scheme, host)
            }
        };

        let user = parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| RequestUser { username: name.to_string() });

        LabelRequest::new(base_url, parts.uri.path(), user)
    }
}

// Extrator
impl<S> FromRequestParts<S> for LabelRequest
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(LabelRequest::from_parts(parts, app_state.settings.site_url.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_uri_uses_base_url() {
        let request = LabelRequest::new("https://inv.example.com", "/api/label/stock/1/print", None);
        assert_eq!(
            request.build_absolute_uri("/stock/item/3/"),
            "https://inv.example.com/stock/item/3/"
        );
    }

    #[test]
    fn timestamp_is_not_serialized() {
        let request = LabelRequest::new("http://localhost", "/", None);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("timestamp").is_none());
        assert_eq!(value["base_url"], "http://localhost");
    }

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/api/label/part/1/print?items=10");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn site_url_wins_over_host_header() {
        let proxied = parts(&[("host", "internal:3000")]);
        let request = LabelRequest::from_parts(&proxied, Some("https://inv.example.com/"));
        assert_eq!(request.base_url, "https://inv.example.com");
        assert_eq!(request.path, "/api/label/part/1/print");
    }

    #[test]
    fn host_and_forwarded_proto_build_the_base_url() {
        let forwarded = parts(&[("host", "inv.local"), ("x-forwarded-proto", "https")]);
        assert_eq!(LabelRequest::from_parts(&forwarded, None).base_url, "https://inv.local");

        let bare = parts(&[]);
        assert_eq!(LabelRequest::from_parts(&bare, None).base_url, "http://localhost");
    }

    #[test]
    fn remote_user_header_sets_the_user_unless_blank() {
        let request = LabelRequest::from_parts(&parts(&[("x-remote-user", " maria ")]), None);
        assert_eq!(request.user, Some(RequestUser { username: "maria".into() }));

        let blank = LabelRequest::from_parts(&parts(&[("x-remote-user", "   ")]), None);
        assert_eq!(blank.user, None);
    }
}
