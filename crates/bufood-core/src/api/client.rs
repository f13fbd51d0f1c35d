//! API client for the storefront REST backend.
//!
//! This module provides the `ApiClient` struct which implements
//! `StorefrontApi` over HTTP. Responses are normalized into the canonical
//! models before they leave this module.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::models::{Cart, CartResponse, Product, RawProduct, RawStore, Store};

use super::{ApiError, StorefrontApi};

// ============================================================================
// Constants
// ============================================================================

/// Default backend location when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the storefront backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<Arc<str>>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(token.into()),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .headers(self.auth_headers()?);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    /// Cart mutations return the cart envelope, which is discarded: the
    /// reconciler resyncs from `GET /cart` afterwards.
    async fn mutate<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()> {
        self.send(method, path, body).await?;
        Ok(())
    }

    /// Product links sometimes carry query parameters; only the ID is used.
    fn clean_product_id(product_id: &str) -> &str {
        product_id.split('?').next().unwrap_or(product_id)
    }
}

#[async_trait]
impl StorefrontApi for ApiClient {
    async fn fetch_all_products(&self) -> Result<Vec<Product>> {
        let raw: Vec<Value> = self.get("/products").await.context("Failed to fetch products")?;
        let products = RawProduct::normalize_all(raw);
        debug!(count = products.len(), "Products fetched");
        Ok(products)
    }

    async fn fetch_all_stores(&self) -> Result<Vec<Store>> {
        let raw: Vec<Value> = self.get("/store").await.context("Failed to fetch stores")?;
        let stores = RawStore::normalize_all(raw);
        debug!(count = stores.len(), "Stores fetched");
        Ok(stores)
    }

    async fn fetch_product_by_id(&self, id: &str) -> Result<Product> {
        let id = Self::clean_product_id(id);
        let raw: RawProduct = self
            .get(&format!("/products/{}", id))
            .await
            .with_context(|| format!("Failed to fetch product {}", id))?;
        raw.normalize(Some(id))
            .ok_or_else(|| ApiError::InvalidResponse(format!("Product {} has no ID", id)).into())
    }

    async fn fetch_store_by_id(&self, id: &str) -> Result<Store> {
        let raw: RawStore = self
            .get(&format!("/store/view/{}", id))
            .await
            .with_context(|| format!("Failed to fetch store {}", id))?;
        raw.normalize(Some(id))
            .ok_or_else(|| ApiError::InvalidResponse(format!("Store {} has no ID", id)).into())
    }

    async fn get_cart(&self) -> Result<Cart> {
        let response: CartResponse = self.get("/cart").await.context("Failed to fetch cart")?;
        Ok(response.into_cart())
    }

    async fn add_item(&self, product_id: &str, quantity: u32) -> Result<()> {
        let body = json!({ "productId": product_id, "quantity": quantity });
        self.mutate(Method::POST, "/cart/add", Some(&body))
            .await
            .context("Failed to add item to cart")
    }

    async fn update_item_quantity(&self, product_id: &str, quantity: u32) -> Result<()> {
        let body = json!({ "productId": product_id, "quantity": quantity });
        self.mutate(Method::PUT, "/cart/update", Some(&body))
            .await
            .context("Failed to update cart item")
    }

    async fn remove_item(&self, product_id: &str) -> Result<()> {
        let body = json!({ "productId": product_id });
        self.mutate(Method::POST, "/cart/remove", Some(&body))
            .await
            .context("Failed to remove item from cart")
    }

    async fn clear_cart(&self) -> Result<()> {
        self.mutate::<()>(Method::DELETE, "/cart/clear", None)
            .await
            .context("Failed to clear cart")
    }
}
