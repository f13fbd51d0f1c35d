//! Plain-text rendering of favorites and cart for the terminal.

use std::fmt::Write;

use bufood_core::models::CatalogEntity;
use bufood_core::{Cart, FavoritesView, LoadPhase, Product, Store};

/// Width of the name column
const NAME_WIDTH: usize = 28;

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

pub fn format_price(amount: f64) -> String {
    format!("₱{:.0}", amount)
}

fn name_cell(name: &str, note: Option<&str>) -> String {
    let name = match note {
        Some(note) => format!("{} ({})", name, note),
        None => name.to_string(),
    };
    format!("{:<width$}", truncate_string(&name, NAME_WIDTH), width = NAME_WIDTH)
}

fn product_note(product: &Product) -> Option<&'static str> {
    if product.is_placeholder() {
        Some("unavailable")
    } else if !product.is_available() {
        Some("sold out")
    } else {
        None
    }
}

pub fn render_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "  No favorite products yet.\n".to_string();
    }
    let mut out = String::new();
    for p in products {
        let _ = writeln!(
            out,
            "  {} {:>8}  {}  [{}]",
            name_cell(&p.name, product_note(p)),
            p.display_price(),
            format_optional(&p.store_name, "-"),
            p.id,
        );
    }
    out
}

pub fn render_stores(stores: &[Store]) -> String {
    if stores.is_empty() {
        return "  No favorite stores yet.\n".to_string();
    }
    let mut out = String::new();
    for s in stores {
        let note = s.is_placeholder().then_some("unavailable");
        let _ = writeln!(out, "  {} [{}]", name_cell(&s.name, note), s.id);
    }
    out
}

pub fn render_cart(cart: &Cart) -> String {
    if cart.items.is_empty() {
        return "  Cart is empty.\n".to_string();
    }
    let mut out = String::new();
    for item in &cart.items {
        let _ = writeln!(
            out,
            "  {} x{:<3} {:>8}",
            name_cell(&item.product.name, None),
            item.quantity,
            format_price(item.product.price * f64::from(item.quantity)),
        );
    }
    let _ = writeln!(
        out,
        "  {:<width$} {:<4} {:>8}",
        "Subtotal",
        cart.item_count(),
        format_price(cart.subtotal()),
        width = NAME_WIDTH + 1,
    );
    out
}

/// One-line summary of load state for the watch screen header.
pub fn status_line(view: &FavoritesView) -> String {
    let mut line = match &view.phase {
        LoadPhase::Idle => "idle".to_string(),
        LoadPhase::Loading => "loading...".to_string(),
        LoadPhase::Ready => match view.last_refreshed {
            Some(at) => format!("updated {}", at.with_timezone(&chrono::Local).format("%H:%M:%S")),
            None => "ready".to_string(),
        },
        LoadPhase::Failed(message) => format!("failed: {}", message),
    };
    if view.is_refreshing {
        line.push_str(" (refreshing)");
    }
    let _ = write!(line, " | cart: {}", view.cart_count);
    line
}

pub fn render_view(view: &FavoritesView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Favorites [{}] ==", status_line(view));
    if let Some(error) = &view.error {
        let _ = writeln!(out, "! {}", error);
    }
    out.push_str("Products:\n");
    out.push_str(&render_products(&view.products));
    out.push_str("Stores:\n");
    out.push_str(&render_stores(&view.stores));
    out
}
