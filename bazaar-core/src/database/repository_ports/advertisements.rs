use std::fmt;

use async_trait::async_trait;

use crate::auth::UserId;
use crate::context::RequestContext;
use crate::error::{BazaarError, Result};
use crate::listing::{Advertisement, AdvertisementId, NewAdvertisement};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    Price,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "a.created_at",
            Self::Price => "a.price",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Validated page request for the public listing feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort: SortField,
    pub order: SortOrder,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            sort: SortField::default(),
            order: SortOrder::default(),
            min_price: None,
            max_price: None,
        }
    }
}

impl ListingQuery {
    /// Build a query from raw request parameters. Absent values take their
    /// defaults; present but invalid values are a `BadRequest`.
    pub fn from_params(
        limit: Option<i64>,
        offset: Option<i64>,
        sort: Option<&str>,
        order: Option<&str>,
        min_price: Option<f64>,
        max_price: Option<f64>,
    ) -> Result<Self> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(BazaarError::bad_request(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(BazaarError::bad_request("offset must not be negative"));
        }

        let sort = match sort {
            None | Some("created_at") => SortField::CreatedAt,
            Some("price") => SortField::Price,
            Some(other) => {
                return Err(BazaarError::bad_request(format!(
                    "unknown sort field {other:?}"
                )));
            }
        };

        let order = match order {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(BazaarError::bad_request(format!(
                    "unknown sort order {other:?}"
                )));
            }
        };

        for price in [min_price, max_price].into_iter().flatten() {
            if !price.is_finite() || price < 0.0 {
                return Err(BazaarError::bad_request(
                    "price filters must be non-negative numbers",
                ));
            }
        }
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            return Err(BazaarError::bad_request(
                "min_price must not exceed max_price",
            ));
        }

        Ok(Self {
            limit,
            offset,
            sort,
            order,
            min_price,
            max_price,
        })
    }

    pub fn matches_price(&self, price: f64) -> bool {
        self.min_price.is_none_or(|min| price >= min)
            && self.max_price.is_none_or(|max| price <= max)
    }
}

#[async_trait]
pub trait AdvertisementRepository: Send + Sync + fmt::Debug {
    /// Persist a validated submission. An unknown owner is a `BadRequest`.
    async fn create(
        &self,
        ctx: &RequestContext,
        ad: &NewAdvertisement,
    ) -> Result<Advertisement>;

    /// `viewer` only drives `is_mine`.
    async fn find_by_id(
        &self,
        ctx: &RequestContext,
        id: AdvertisementId,
        viewer: Option<UserId>,
    ) -> Result<Advertisement>;

    async fn list(
        &self,
        ctx: &RequestContext,
        query: &ListingQuery,
        viewer: Option<UserId>,
    ) -> Result<Vec<Advertisement>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        let query = ListingQuery::from_params(None, None, None, None, None, None).unwrap();
        assert_eq!(query, ListingQuery::default());
        assert_eq!(query.limit, 10);
        assert_eq!(query.sort.column(), "a.created_at");
        assert_eq!(query.order.keyword(), "DESC");
    }

    #[test]
    fn parses_explicit_values() {
        let query = ListingQuery::from_params(
            Some(100),
            Some(20),
            Some("price"),
            Some("asc"),
            Some(1.5),
            Some(99.0),
        )
        .unwrap();
        assert_eq!(query.sort, SortField::Price);
        assert_eq!(query.order, SortOrder::Asc);
        assert!(query.matches_price(1.5));
        assert!(!query.matches_price(99.5));
    }

    #[test]
    fn rejects_out_of_range_params() {
        let cases = [
            ListingQuery::from_params(Some(0), None, None, None, None, None),
            ListingQuery::from_params(Some(101), None, None, None, None, None),
            ListingQuery::from_params(None, Some(-1), None, None, None, None),
            ListingQuery::from_params(None, None, Some("title; DROP"), None, None, None),
            ListingQuery::from_params(None, None, None, Some("sideways"), None, None),
            ListingQuery::from_params(None, None, None, None, Some(-5.0), None),
            ListingQuery::from_params(None, None, None, None, Some(10.0), Some(1.0)),
        ];
        for case in cases {
            assert!(matches!(case, Err(BazaarError::BadRequest(_))), "{case:?}");
        }
    }
}
