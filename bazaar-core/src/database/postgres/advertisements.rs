use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use crate::auth::UserId;
use crate::context::RequestContext;
use crate::database::repository_ports::advertisements::{
    AdvertisementRepository, ListingQuery,
};
use crate::error::{BazaarError, Result};
use crate::listing::{Advertisement, AdvertisementId, NewAdvertisement};

#[derive(Debug, Clone)]
pub struct PostgresAdvertisementRepository {
    pool: PgPool,
}

impl PostgresAdvertisementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// `$1` is always the viewer id (NULL for anonymous readers).
const SELECT_WITH_AUTHOR: &str = "SELECT a.id, a.user_id, a.title, a.description, \
     a.image_url, a.price, a.created_at, a.updated_at, \
     u.login AS author_login, \
     COALESCE(a.user_id = $1, FALSE) AS is_mine \
     FROM advertisements a \
     JOIN users u ON u.id = a.user_id";

fn map_insert_error(err: sqlx::Error) -> BazaarError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_foreign_key_violation()
    {
        return BazaarError::bad_request("listing owner does not exist");
    }
    BazaarError::from(err)
}

#[async_trait]
impl AdvertisementRepository for PostgresAdvertisementRepository {
    #[instrument(
        name = "db.ads.create",
        skip(self, ctx, ad),
        fields(request_id = %ctx.request_id(), user_id = ad.user_id)
    )]
    async fn create(
        &self,
        ctx: &RequestContext,
        ad: &NewAdvertisement,
    ) -> Result<Advertisement> {
        sqlx::query_as::<_, Advertisement>(
            "WITH inserted AS ( \
                 INSERT INTO advertisements (user_id, title, description, image_url, price) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING * \
             ) \
             SELECT i.id, i.user_id, i.title, i.description, i.image_url, i.price, \
                    i.created_at, i.updated_at, u.login AS author_login, TRUE AS is_mine \
             FROM inserted i \
             JOIN users u ON u.id = i.user_id",
        )
        .bind(ad.user_id)
        .bind(&ad.title)
        .bind(&ad.description)
        .bind(&ad.image_url)
        .bind(ad.price)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)
    }

    #[instrument(
        name = "db.ads.find_by_id",
        skip(self, ctx),
        fields(request_id = %ctx.request_id())
    )]
    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: AdvertisementId,
        viewer: Option<UserId>,
    ) -> Result<Advertisement> {
        let sql = format!("{SELECT_WITH_AUTHOR} WHERE a.id = $2");
        sqlx::query_as::<_, Advertisement>(&sql)
            .bind(viewer)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                BazaarError::not_found(format!("advertisement {id} not found"))
            })
    }

    #[instrument(
        name = "db.ads.list",
        skip(self, ctx, query),
        fields(request_id = %ctx.request_id(), limit = query.limit, offset = query.offset)
    )]
    async fn list(
        &self,
        ctx: &RequestContext,
        query: &ListingQuery,
        viewer: Option<UserId>,
    ) -> Result<Vec<Advertisement>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT a.id, a.user_id, a.title, a.description, a.image_url, \
             a.price, a.created_at, a.updated_at, u.login AS author_login, \
             COALESCE(a.user_id = ",
        );
        builder.push_bind(viewer);
        builder.push(
            ", FALSE) AS is_mine \
             FROM advertisements a \
             JOIN users u ON u.id = a.user_id \
             WHERE TRUE",
        );

        if let Some(min) = query.min_price {
            builder.push(" AND a.price >= ");
            builder.push_bind(min);
        }
        if let Some(max) = query.max_price {
            builder.push(" AND a.price <= ");
            builder.push_bind(max);
        }

        // Sort column and direction come from closed enums, never from input.
        let direction = query.order.keyword();
        builder.push(format!(
            " ORDER BY {} {direction}, a.id {direction}",
            query.sort.column()
        ));
        builder.push(" LIMIT ");
        builder.push_bind(query.limit);
        builder.push(" OFFSET ");
        builder.push_bind(query.offset);

        let ads = builder
            .build_query_as::<Advertisement>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = ads.len(), "listings fetched");
        Ok(ads)
    }
}
