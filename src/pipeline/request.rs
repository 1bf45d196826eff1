//! The pipeline's view of an incoming request.

use std::net::IpAddr;

use axum::http::{header, HeaderMap, Method};
use bytes::Bytes;
use serde_json::Value;

/// Everything the pipeline reads from a request. The body is buffered so
/// webhook signatures can be checked over the exact bytes received.
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub client_ip: IpAddr,
    pub body: Bytes,
    pub request_id: Option<String>,
}

impl GateRequest {
    pub fn new(method: Method, path: impl Into<String>, client_ip: IpAddr) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            client_ip,
            body: Bytes::new(),
            request_id: None,
        }
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT)
    }

    pub fn origin(&self) -> Option<&str> {
        self.header(header::ORIGIN)
    }

    /// Bearer token from `Authorization`, else the named session cookie.
    ///
    /// A present but malformed `Authorization` header yields `None`; the
    /// cookie is only consulted when the header is absent.
    pub fn credential(&self, session_cookie: Option<&str>) -> Option<&str> {
        if self.headers.contains_key(header::AUTHORIZATION) {
            return self.header(header::AUTHORIZATION).and_then(parse_bearer);
        }
        session_cookie.and_then(|name| self.cookie(name))
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Email address submitted in the body, as a JSON `email` field or a
    /// form-urlencoded `email` parameter.
    pub fn body_email(&self) -> Option<String> {
        if self.body.is_empty() {
            return None;
        }
        let is_form = self
            .header(header::CONTENT_TYPE)
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|media| {
                media
                    .trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            });

        let email = if is_form {
            url::form_urlencoded::parse(&self.body)
                .find(|(k, _)| k == "email")
                .map(|(_, v)| v.into_owned())
        } else {
            serde_json::from_slice::<Value>(&self.body)
                .ok()
                .and_then(|v| v.get("email").and_then(Value::as_str).map(str::to_owned))
        };
        email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())
    }
}

fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::Ipv4Addr;

    fn request() -> GateRequest {
        GateRequest::new(Method::POST, "/auth/login", IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn with_header(mut req: GateRequest, name: header::HeaderName, value: &str) -> GateRequest {
        req.headers.append(name, HeaderValue::from_str(value).unwrap());
        req
    }

    #[test]
    fn test_bearer_credential() {
        let req = with_header(request(), header::AUTHORIZATION, "Bearer abc.def.ghi");
        assert_eq!(req.credential(None), Some("abc.def.ghi"));

        let req = with_header(request(), header::AUTHORIZATION, "bearer abc");
        assert_eq!(req.credential(None), Some("abc"));
    }

    #[test]
    fn test_malformed_authorization_is_missing() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   ", "abc.def.ghi"] {
            let req = with_header(request(), header::AUTHORIZATION, value);
            assert_eq!(req.credential(Some("session")), None, "{value}");
        }
    }

    #[test]
    fn test_cookie_fallback() {
        let req = with_header(request(), header::COOKIE, "theme=dark; session=tok123");
        assert_eq!(req.credential(Some("session")), Some("tok123"));
        assert_eq!(req.credential(None), None);
        assert_eq!(req.credential(Some("other")), None);
    }

    #[test]
    fn test_body_email_json_and_form() {
        let mut req = request();
        req.body = Bytes::from_static(br#"{"email":" Alice@Example.com "}"#);
        assert_eq!(req.body_email().as_deref(), Some("Alice@Example.com"));

        let mut req = with_header(
            request(),
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );
        req.body = Bytes::from_static(b"name=a&email=bob%40corp.example");
        assert_eq!(req.body_email().as_deref(), Some("bob@corp.example"));
    }

    #[test]
    fn test_form_content_type_is_case_insensitive() {
        let mut req = with_header(
            request(),
            header::CONTENT_TYPE,
            "Application/X-WWW-Form-Urlencoded; charset=UTF-8",
        );
        req.body = Bytes::from_static(b"email=carol%40corp.example");
        assert_eq!(req.body_email().as_deref(), Some("carol@corp.example"));
    }

    #[test]
    fn test_body_email_missing() {
        let mut req = request();
        assert_eq!(req.body_email(), None);
        req.body = Bytes::from_static(b"not json");
        assert_eq!(req.body_email(), None);
        req.body = Bytes::from_static(br#"{"email":42}"#);
        assert_eq!(req.body_email(), None);
    }
}
