//! Read-only lookups against the user and product projections owned by the
//! identity and catalog services. Only used to annotate conversation
//! responses with names, avatars and product context.

use crate::error::AppResult;
use deadpool_postgres::Pool;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub title: String,
    pub image: String,
    pub price: f64,
}

pub struct Directory;

impl Directory {
    pub async fn user(db: &Pool, user_id: Uuid) -> AppResult<Option<UserSummary>> {
        let client = db.get().await?;
        let row = client
            .query_opt("SELECT id, name, avatar FROM users WHERE id = $1", &[&user_id])
            .await?;
        Ok(row.map(|r| UserSummary {
            id: r.get("id"),
            name: r.get("name"),
            avatar: r.get("avatar"),
        }))
    }

    /// Like `user`, but substitutes a placeholder for missing rows so list
    /// annotation never fails a whole response over one stale reference.
    pub async fn user_or_placeholder(db: &Pool, user_id: Uuid) -> AppResult<UserSummary> {
        Ok(Self::user(db, user_id).await?.unwrap_or(UserSummary {
            id: user_id,
            name: "Unknown User".into(),
            avatar: String::new(),
        }))
    }

    pub async fn product(db: &Pool, product_id: Uuid) -> AppResult<Option<ProductSummary>> {
        let client = db.get().await?;
        let row = client
            .query_opt(
                "SELECT id, title, image, price FROM products WHERE id = $1",
                &[&product_id],
            )
            .await?;
        Ok(row.map(|r| ProductSummary {
            id: r.get("id"),
            title: r.get("title"),
            image: r.get("image"),
            price: r.get("price"),
        }))
    }

    pub async fn product_or_placeholder(db: &Pool, product_id: Uuid) -> AppResult<ProductSummary> {
        Ok(Self::product(db, product_id).await?.unwrap_or(ProductSummary {
            id: product_id,
            title: String::new(),
            image: String::new(),
            price: 0.0,
        }))
    }
}
