use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Cart, Product, Store};

/// Backend operations the reconciler depends on.
///
/// Every method may fail with a transport or server error; callers decide
/// whether the failure is surfaced or swallowed.
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn fetch_all_products(&self) -> Result<Vec<Product>>;

    async fn fetch_all_stores(&self) -> Result<Vec<Store>>;

    async fn fetch_product_by_id(&self, id: &str) -> Result<Product>;

    async fn fetch_store_by_id(&self, id: &str) -> Result<Store>;

    async fn get_cart(&self) -> Result<Cart>;

    async fn add_item(&self, product_id: &str, quantity: u32) -> Result<()>;

    async fn update_item_quantity(&self, product_id: &str, quantity: u32) -> Result<()>;

    async fn remove_item(&self, product_id: &str) -> Result<()>;

    async fn clear_cart(&self) -> Result<()>;
}
