//! Product catalog service

use chrono::Utc;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::models::{Actor, NewProduct, Product, ProductRow};

#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

pub(crate) const PRODUCT_COLUMNS: &str =
    "id, name, category, unit, opening_stock, unit_price, currency, created_at";

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE ($1::TEXT IS NULL OR LOWER(category) = LOWER($1))
              AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%')
            ORDER BY name
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(filter.category.as_deref().map(str::trim))
        .bind(filter.search.as_deref().map(str::trim))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(ProductRow::into_domain).collect()
    }

    pub async fn get(&self, product_id: i64) -> AppResult<Product> {
        let mut conn = self.db.acquire().await?;
        fetch_product(&mut conn, product_id, false).await
    }

    pub async fn create(&self, actor: &Actor, input: NewProduct) -> AppResult<Product> {
        let product = Product::register(actor, input, Utc::now())?;

        let created = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (name, category, unit, opening_stock, unit_price, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.opening_stock)
        .bind(product.unit_price)
        .bind(product.currency.as_str())
        .fetch_one(&self.db)
        .await?
        .into_domain()?;

        tracing::info!(product_id = created.id, name = %created.name, actor = actor.id, "Product registered");
        Ok(created)
    }
}

/// Load one product, optionally locking its row for the rest of the transaction
pub async fn fetch_product(conn: &mut PgConnection, product_id: i64, lock: bool) -> AppResult<Product> {
    let mut sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
    if lock {
        sql.push_str(" FOR UPDATE");
    }
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?
        .into_domain()
}

/// The whole catalog, used to resolve document lines to products
pub async fn fetch_all_products(conn: &mut PgConnection) -> AppResult<Vec<Product>> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {} FROM products ORDER BY id",
        PRODUCT_COLUMNS
    ))
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(ProductRow::into_domain).collect()
}

/// Fail with a field-level validation error if any referenced product id is unknown
pub async fn ensure_products_exist<I>(conn: &mut PgConnection, ids: I, field: &str) -> AppResult<()>
where
    I: IntoIterator<Item = (usize, Option<i64>)>,
{
    for (idx, id) in ids {
        let Some(id) = id else { continue };
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        if !exists {
            return Err(AppError::validation(
                format!("{}[{}].product_id", field, idx),
                format!("Product {} does not exist", id),
            ));
        }
    }
    Ok(())
}
