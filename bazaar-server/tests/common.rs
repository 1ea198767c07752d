// Helpers are shared across test binaries; not every binary uses all of them.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use bazaar_core::auth::{CsrfGuard, SessionStore};
use bazaar_core::kv::{KvStore, MemoryKvStore};
use bazaar_core::listing::ImageAdmission;
use bazaar_core::testing::{
    InMemoryAdvertisementRepository, InMemoryUserRepository, ScriptedFetcher,
    fast_credential_hasher,
};
use bazaar_server::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const PASSWORD: &str = "hunter2hunter2";
pub const SESSION_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub fetcher: ScriptedFetcher,
    pub users: InMemoryUserRepository,
    pub ads: InMemoryAdvertisementRepository,
}

/// Cookies and CSRF token held by a logged-in client.
#[derive(Debug, Clone)]
pub struct Client {
    pub session_id: String,
    pub csrf_token: String,
}

impl Client {
    pub fn cookie_header(&self) -> String {
        format!(
            "session_id={}; csrf_token={}",
            self.session_id, self.csrf_token
        )
    }
}

pub fn test_app() -> TestApp {
    test_app_with_kv(Arc::new(MemoryKvStore::new()))
}

pub fn test_app_with_kv(kv: Arc<dyn KvStore>) -> TestApp {
    let users = InMemoryUserRepository::new();
    let ads = InMemoryAdvertisementRepository::new(users.clone());
    let fetcher = ScriptedFetcher::new();

    let state = AppState {
        users: Arc::new(users.clone()),
        advertisements: Arc::new(ads.clone()),
        sessions: SessionStore::new(kv, SESSION_TTL),
        csrf: CsrfGuard::new(SESSION_TTL),
        hasher: Arc::new(fast_credential_hasher()),
        image_admission: ImageAdmission::new(
            Arc::new(fetcher.clone()),
            Duration::from_secs(5),
        ),
        cookie_secure: false,
    };

    let router = bazaar_server::create_app(
        state.clone(),
        &["http://localhost:3000".to_string()],
    );

    TestApp {
        router,
        state,
        fetcher,
        users,
        ads,
    }
}

#[derive(Debug)]
pub struct RequestSpec<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub body: Option<Value>,
    pub cookies: Option<String>,
    pub csrf_header: Option<&'a str>,
}

impl<'a> RequestSpec<'a> {
    pub fn get(uri: &'a str) -> Self {
        Self {
            method: "GET",
            uri,
            body: None,
            cookies: None,
            csrf_header: None,
        }
    }

    pub fn post(uri: &'a str, body: Value) -> Self {
        Self {
            method: "POST",
            uri,
            body: Some(body),
            cookies: None,
            csrf_header: None,
        }
    }

    pub fn cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    pub fn csrf(mut self, token: &'a str) -> Self {
        self.csrf_header = Some(token);
        self
    }

    /// Session cookie, CSRF cookie and matching header.
    pub fn as_client(self, client: &'a Client) -> Self {
        self.cookies(client.cookie_header()).csrf(&client.csrf_token)
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(cookies) = self.cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        if let Some(token) = self.csrf_header {
            builder = builder.header("x-csrf-token", token);
        }
        match self.body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: RequestSpec<'_>) -> Response<Body> {
        self.router.clone().oneshot(request.build()).await.unwrap()
    }

    pub async fn register(&self, login: &str) -> Client {
        let response = self
            .send(RequestSpec::post(
                "/api/v1/user/register",
                registration(login),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        client_from(&response)
    }

    pub async fn login(&self, login: &str, password: &str) -> Response<Body> {
        self.send(RequestSpec::post(
            "/api/v1/user/login",
            json!({ "login": login, "password": password }),
        ))
        .await
    }

    pub async fn is_authenticated(&self, client: &Client) -> bool {
        let response = self
            .send(
                RequestSpec::get("/api/v1/auth/isAuth")
                    .cookies(client.cookie_header()),
            )
            .await;
        match response.status() {
            StatusCode::OK => true,
            StatusCode::UNAUTHORIZED => false,
            other => panic!("unexpected isAuth status {other}"),
        }
    }
}

pub fn registration(login: &str) -> Value {
    json!({
        "login": login,
        "password": PASSWORD,
        "first_name": "Ada",
        "last_name": "Lovelace",
    })
}

/// `name -> full Set-Cookie value` for every cookie set by `response`.
pub fn set_cookies(response: &Response<Body>) -> HashMap<String, String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| {
            let (name, _) = value.split_once('=')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or_default()
}

pub fn client_from(response: &Response<Body>) -> Client {
    let cookies = set_cookies(response);
    let session_id = cookie_value(&cookies["session_id"]).to_string();
    let csrf_token = cookie_value(&cookies["csrf_token"]).to_string();
    assert!(!session_id.is_empty());
    assert!(!csrf_token.is_empty());

    let header_token = response
        .headers()
        .get("x-csrf-token")
        .and_then(|value| value.to_str().ok())
        .unwrap();
    assert_eq!(header_token, csrf_token);

    Client {
        session_id,
        csrf_token,
    }
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
