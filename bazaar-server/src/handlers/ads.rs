use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bazaar_core::RequestContext;
use bazaar_core::database::ListingQuery;
use bazaar_core::listing::{Advertisement, AdvertisementId, NewAdvertisement};
use serde::Deserialize;
use tracing::info;

use crate::infra::app_state::AppState;
use crate::infra::errors::AppResult;
use crate::infra::middleware::session::{AuthSession, OptionalSession};

#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(session): Extension<AuthSession>,
    Json(mut submission): Json<NewAdvertisement>,
) -> AppResult<(StatusCode, Json<Advertisement>)> {
    submission.user_id = session.user_id;
    submission.normalize_and_validate()?;

    let probe = state
        .image_admission
        .admit(&ctx, &submission.image_url)
        .await?;

    let ad = state.advertisements.create(&ctx, &submission).await?;
    info!(
        ad_id = ad.id,
        user_id = ad.user_id,
        width = probe.pixel_width,
        height = probe.pixel_height,
        "listing created"
    );

    Ok((StatusCode::CREATED, Json(ad)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    OptionalSession(viewer): OptionalSession,
    Path(id): Path<AdvertisementId>,
) -> AppResult<Json<Advertisement>> {
    let ad = state.advertisements.find_by_id(&ctx, id, viewer).await?;
    Ok(Json(ad))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    OptionalSession(viewer): OptionalSession,
    Query(params): Query<ListingParams>,
) -> AppResult<Json<Vec<Advertisement>>> {
    let query = ListingQuery::from_params(
        params.limit,
        params.offset,
        params.sort.as_deref(),
        params.order.as_deref(),
        params.min_price,
        params.max_price,
    )?;

    let ads = state.advertisements.list(&ctx, &query, viewer).await?;
    Ok(Json(ads))
}
