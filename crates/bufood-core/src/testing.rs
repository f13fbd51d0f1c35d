//! In-memory `StorefrontApi` used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::{ApiError, StorefrontApi};
use crate::models::{Cart, CartItem, Product, Store};

pub fn product(id: &str, name: &str) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        price: 50.0,
        category: None,
        availability: None,
        image: format!("{}.png", id),
        store_name: None,
        placeholder: false,
    }
}

pub fn store(id: &str, name: &str) -> Store {
    Store {
        id: id.to_string(),
        name: name.to_string(),
        image: format!("{}.png", id),
        description: String::new(),
        placeholder: false,
    }
}

#[derive(Default)]
pub struct FakeApi {
    products: Mutex<Vec<Product>>,
    stores: Mutex<Vec<Store>>,
    cart: Mutex<Cart>,
    failing_ids: Mutex<HashSet<String>>,
    fail_bulk: AtomicBool,
    fail_cart: AtomicBool,
    fail_cart_mutations: AtomicBool,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeApi {
    pub fn with_catalog(products: Vec<Product>, stores: Vec<Store>) -> Self {
        let api = Self::default();
        *api.products.lock() = products;
        *api.stores.lock() = stores;
        api
    }

    pub fn set_cart(&self, cart: Cart) {
        *self.cart.lock() = cart;
    }

    pub fn cart(&self) -> Cart {
        self.cart.lock().clone()
    }

    pub fn fail_lookup(&self, id: &str) {
        self.failing_ids.lock().insert(id.to_string());
    }

    pub fn fail_bulk(&self, fail: bool) {
        self.fail_bulk.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cart(&self, fail: bool) {
        self.fail_cart.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cart_mutations(&self, fail: bool) {
        self.fail_cart_mutations.store(fail, Ordering::SeqCst);
    }

    /// Every call sleeps this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    async fn enter(&self, name: &'static str) {
        *self.calls.lock().entry(name).or_insert(0) += 1;
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(ApiError::ServerError("injected failure".to_string()).into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorefrontApi for FakeApi {
    async fn fetch_all_products(&self) -> Result<Vec<Product>> {
        self.enter("fetch_all_products").await;
        Self::check(&self.fail_bulk)?;
        Ok(self.products.lock().clone())
    }

    async fn fetch_all_stores(&self) -> Result<Vec<Store>> {
        self.enter("fetch_all_stores").await;
        Self::check(&self.fail_bulk)?;
        Ok(self.stores.lock().clone())
    }

    async fn fetch_product_by_id(&self, id: &str) -> Result<Product> {
        self.enter("fetch_product_by_id").await;
        if self.failing_ids.lock().contains(id) {
            return Err(ApiError::ServerError(id.to_string()).into());
        }
        let found = self.products.lock().iter().find(|p| p.id == id).cloned();
        found.ok_or_else(|| ApiError::NotFound(id.to_string()).into())
    }

    async fn fetch_store_by_id(&self, id: &str) -> Result<Store> {
        self.enter("fetch_store_by_id").await;
        if self.failing_ids.lock().contains(id) {
            return Err(ApiError::ServerError(id.to_string()).into());
        }
        let found = self.stores.lock().iter().find(|s| s.id == id).cloned();
        found.ok_or_else(|| ApiError::NotFound(id.to_string()).into())
    }

    async fn get_cart(&self) -> Result<Cart> {
        self.enter("get_cart").await;
        Self::check(&self.fail_cart)?;
        Ok(self.cart.lock().clone())
    }

    async fn add_item(&self, product_id: &str, quantity: u32) -> Result<()> {
        self.enter("add_item").await;
        Self::check(&self.fail_cart_mutations)?;
        let known = self.products.lock().iter().find(|p| p.id == product_id).cloned();
        let mut cart = self.cart.lock();
        match cart.items.iter_mut().find(|i| i.product.id == product_id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => cart.items.push(CartItem {
                product: known.unwrap_or_else(|| product(product_id, product_id)),
                quantity,
            }),
        }
        Ok(())
    }

    async fn update_item_quantity(&self, product_id: &str, quantity: u32) -> Result<()> {
        self.enter("update_item_quantity").await;
        Self::check(&self.fail_cart_mutations)?;
        let mut cart = self.cart.lock();
        *cart = cart.with_quantity(product_id, quantity);
        Ok(())
    }

    async fn remove_item(&self, product_id: &str) -> Result<()> {
        self.enter("remove_item").await;
        Self::check(&self.fail_cart_mutations)?;
        let mut cart = self.cart.lock();
        *cart = cart.without(product_id);
        Ok(())
    }

    async fn clear_cart(&self) -> Result<()> {
        self.enter("clear_cart").await;
        Self::check(&self.fail_cart_mutations)?;
        *self.cart.lock() = Cart::default();
        Ok(())
    }
}
