use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::product::{Product, RawProduct};
use super::CatalogEntity;

/// Envelope used by every cart endpoint: `{ "data": { "cart": {...} } }`.
#[derive(Debug, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub data: Option<CartResponseData>,
}

#[derive(Debug, Deserialize)]
pub struct CartResponseData {
    #[serde(default)]
    pub cart: Option<RawCart>,
}

/// Items are decoded one by one so a single odd line cannot hide the cart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCart {
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCartItem {
    #[serde(default)]
    pub product: Option<RawCartProduct>,
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// A line's product is populated on most endpoints and a bare ID on others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCartProduct {
    Populated(RawProduct),
    Id(String),
}

impl RawCartProduct {
    fn normalize(self) -> Option<Product> {
        match self {
            RawCartProduct::Populated(raw) => raw.normalize(None),
            RawCartProduct::Id(id) if !id.trim().is_empty() => Some(Product::placeholder(id.trim())),
            RawCartProduct::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartResponse {
    /// Unwrap the envelope; a response without a cart is an empty cart.
    pub fn into_cart(self) -> Cart {
        self.data
            .and_then(|d| d.cart)
            .map(RawCart::normalize)
            .unwrap_or_default()
    }
}

impl RawCart {
    /// Items whose product has been deleted server-side are dropped, as
    /// are lines that do not parse.
    pub fn normalize(self) -> Cart {
        let items = self
            .items
            .into_iter()
            .filter_map(|value| {
                let item = match serde_json::from_value::<RawCartItem>(value) {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed cart line");
                        return None;
                    }
                };
                let product = item.product?.normalize()?;
                Some(CartItem {
                    product,
                    quantity: item.quantity.unwrap_or(0),
                })
            })
            .collect();
        Cart { items }
    }
}

impl Cart {
    /// Total number of units, as shown on the cart badge. Saturates.
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |total, i| total.saturating_add(i.quantity))
    }

    pub fn subtotal(&self) -> f64 {
        self.items
            .iter()
            .map(|i| i.product.price * f64::from(i.quantity))
            .sum()
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.items.iter().any(|i| i.product.id == product_id)
    }

    pub fn quantity_of(&self, product_id: &str) -> Option<u32> {
        self.items
            .iter()
            .find(|i| i.product.id == product_id)
            .map(|i| i.quantity)
    }

    /// Copy of this cart with one line set to `quantity`. Unknown products
    /// are left untouched; the server response will fill them in.
    pub fn with_quantity(&self, product_id: &str, quantity: u32) -> Cart {
        let items = self
            .items
            .iter()
            .map(|i| {
                if i.product.id == product_id {
                    CartItem {
                        product: i.product.clone(),
                        quantity,
                    }
                } else {
                    i.clone()
                }
            })
            .collect();
        Cart { items }
    }

    pub fn without(&self, product_id: &str) -> Cart {
        Cart {
            items: self
                .items
                .iter()
                .filter(|i| i.product.id != product_id)
                .cloned()
                .collect(),
        }
    }
}
