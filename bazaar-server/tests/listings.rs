mod common;

use axum::http::StatusCode;
use bazaar_core::testing::{ScriptedImage, encode_png};
use serde_json::{Value, json};

use common::{RequestSpec, read_json, test_app};

const IMAGE_URL: &str = "https://cdn.example.com/bikes/road.png";

fn listing(title: &str, price: f64, image_url: &str) -> Value {
    json!({
        "title": title,
        "description": "Lightly used, always stored indoors",
        "image_url": image_url,
        "price": price,
    })
}

#[tokio::test]
async fn create_admits_the_image_and_stores_the_listing() {
    let app = test_app();
    app.fetcher
        .insert(IMAGE_URL, ScriptedImage::ok("image/png", encode_png(800, 600)));
    let client = app.register("ada").await;

    let response = app
        .send(
            RequestSpec::post("/api/v1/ad/create", listing("  Road bike ", 450.0, IMAGE_URL))
                .as_client(&client),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let ad = read_json(response).await;
    assert_eq!(ad["title"], "Road bike");
    assert_eq!(ad["author_login"], "ada");
    assert_eq!(ad["is_mine"], true);
    assert_eq!(app.fetcher.probe_calls(), 1);
    assert_eq!(app.fetcher.fetch_calls(), 1);

    let anonymous = app.send(RequestSpec::get("/api/v1/ad/1")).await;
    assert_eq!(anonymous.status(), StatusCode::OK);
    assert_eq!(read_json(anonymous).await["is_mine"], false);

    let owner = app
        .send(RequestSpec::get("/api/v1/ad/1").cookies(client.cookie_header()))
        .await;
    assert_eq!(read_json(owner).await["is_mine"], true);
}

#[tokio::test]
async fn oversized_images_are_rejected_before_download() {
    let app = test_app();
    app.fetcher.insert(
        IMAGE_URL,
        ScriptedImage::ok("image/png", encode_png(10, 10))
            .with_declared_length(10 * 1024 * 1024),
    );
    let client = app.register("ada").await;

    let response = app
        .send(
            RequestSpec::post("/api/v1/ad/create", listing("Road bike", 450.0, IMAGE_URL))
                .as_client(&client),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.fetcher.fetch_calls(), 0);
    assert!(app.ads.is_empty());
}

#[tokio::test]
async fn oversized_dimensions_are_rejected() {
    let app = test_app();
    app.fetcher
        .insert(IMAGE_URL, ScriptedImage::ok("image/png", encode_png(5000, 10)));
    let client = app.register("ada").await;

    let response = app
        .send(
            RequestSpec::post("/api/v1/ad/create", listing("Road bike", 450.0, IMAGE_URL))
                .as_client(&client),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.ads.is_empty());
}

#[tokio::test]
async fn invalid_submissions_never_reach_the_network() {
    let app = test_app();
    let client = app.register("ada").await;

    for body in [
        listing("ab", 450.0, IMAGE_URL),
        listing("Road bike", -1.0, IMAGE_URL),
        listing("Road bike", 450.0, "https://cdn.example.com/road.webp"),
    ] {
        let response = app
            .send(RequestSpec::post("/api/v1/ad/create", body).as_client(&client))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(app.fetcher.probe_calls(), 0);
}

#[tokio::test]
async fn create_requires_session_and_csrf() {
    let app = test_app();
    let client = app.register("ada").await;

    let anonymous = app
        .send(RequestSpec::post(
            "/api/v1/ad/create",
            listing("Road bike", 450.0, IMAGE_URL),
        ))
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let without_csrf = app
        .send(
            RequestSpec::post("/api/v1/ad/create", listing("Road bike", 450.0, IMAGE_URL))
                .cookies(client.cookie_header()),
        )
        .await;
    assert_eq!(without_csrf.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.fetcher.probe_calls(), 0);
}

#[tokio::test]
async fn listing_filters_sorts_and_pages() {
    let app = test_app();
    let client = app.register("ada").await;

    for (index, price) in [300.0, 100.0, 200.0].into_iter().enumerate() {
        let url = format!("https://cdn.example.com/item-{index}.png");
        app.fetcher
            .insert(&url, ScriptedImage::ok("image/png", encode_png(64, 64)));
        let response = app
            .send(
                RequestSpec::post("/api/v1/ad/create", listing("Bicycle", price, &url))
                    .as_client(&client),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .send(RequestSpec::get(
            "/api/v1/ad/all?sort=price&order=asc&min_price=150",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let ads = read_json(response).await;
    let prices: Vec<f64> = ads
        .as_array()
        .unwrap()
        .iter()
        .map(|ad| ad["price"].as_f64().unwrap())
        .collect();
    assert_eq!(prices, vec![200.0, 300.0]);

    let page = app
        .send(RequestSpec::get("/api/v1/ad/all?sort=price&order=desc&limit=1&offset=1"))
        .await;
    let page = read_json(page).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["price"], 200.0);
}

#[tokio::test]
async fn listing_rejects_unknown_parameters() {
    let app = test_app();

    for query in [
        "/api/v1/ad/all?sort=title",
        "/api/v1/ad/all?order=sideways",
        "/api/v1/ad/all?min_price=10&max_price=5",
    ] {
        let response = app.send(RequestSpec::get(query)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{query}");
    }
}

#[tokio::test]
async fn unknown_listing_is_not_found() {
    let app = test_app();
    let response = app.send(RequestSpec::get("/api/v1/ad/42")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
