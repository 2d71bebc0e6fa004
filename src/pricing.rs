use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{PricingTier, ProductPricing};
use crate::schema::{pricing_tiers, product_pricing};

pub const VP_AR_UPGRADE_KEY: &str = "vp_ar_upgrade";
pub const VP_AR_VIRTUAL_PROTOTYPE_KEY: &str = "vp_ar_virtual_prototype";
pub const VP_ANIMATED_VIDEO_ROTATION_KEY: &str = "vp_animated_video_rotation";
pub const VP_ANIMATED_VIDEO_EXPLODED_KEY: &str = "vp_animated_video_exploded";
pub const VP_ANIMATED_VIDEO_BOTH_KEY: &str = "vp_animated_video_both";

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("no active pricing found for product {0}")]
    ProductNotFound(String),
    #[error("unknown pricing tier {0}")]
    TierNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type PricingResult<T> = Result<T, PricingError>;

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub product_key: String,
    pub pricing_tier_id: Option<Uuid>,
    pub tier_name: Option<String>,
    pub quantity: Option<i32>,
    #[serde(default)]
    pub add_ons: Vec<String>,
    pub vp_add_ons: Option<VpAddOns>,
}

/// Special options for the virtual-prototype service. Each maps to a
/// fixed product key that carries its own price row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VpAddOns {
    #[serde(default)]
    pub ar_upgrade: bool,
    #[serde(default)]
    pub ar_virtual_prototype: bool,
    pub animated_video: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteLineItem {
    pub product_key: Option<String>,
    pub label: String,
    pub amount: f64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub line_items: Vec<QuoteLineItem>,
    pub total_amount: f64,
}

/// Computes an itemized quote. Read-only over the price table: calling
/// twice with the same input yields the same quote.
pub fn resolve_pricing(conn: &mut PgConnection, request: &QuoteRequest) -> PricingResult<Quote> {
    let tier_id = resolve_tier_id(conn, request)?;
    let quantity = request.quantity.unwrap_or(1).max(1);

    let base = lookup_product(conn, &request.product_key, tier_id)?
        .ok_or_else(|| PricingError::ProductNotFound(request.product_key.clone()))?;

    let mut line_items = vec![QuoteLineItem {
        product_key: Some(base.product_key.clone()),
        label: humanize_key(&base.product_key),
        amount: base_amount(&base, quantity),
        quantity,
    }];

    for add_on in &request.add_ons {
        if let Some(product) = lookup_product(conn, add_on, tier_id)? {
            line_items.push(QuoteLineItem {
                product_key: Some(product.product_key.clone()),
                label: humanize_key(&product.product_key),
                amount: product.price,
                quantity: 1,
            });
        }
    }

    if let Some(vp) = &request.vp_add_ons {
        for key in vp_product_keys(vp) {
            if let Some(product) = lookup_product(conn, key, tier_id)? {
                line_items.push(QuoteLineItem {
                    product_key: Some(product.product_key.clone()),
                    label: humanize_key(&product.product_key),
                    amount: product.price,
                    quantity: 1,
                });
            }
        }
    }

    let total_amount = line_items.iter().map(|item| item.amount).sum();

    Ok(Quote {
        line_items,
        total_amount,
    })
}

fn resolve_tier_id(
    conn: &mut PgConnection,
    request: &QuoteRequest,
) -> PricingResult<Option<Uuid>> {
    if request.pricing_tier_id.is_some() {
        return Ok(request.pricing_tier_id);
    }
    match &request.tier_name {
        Some(name) => {
            let tier: Option<PricingTier> = pricing_tiers::table
                .filter(pricing_tiers::name.eq(name))
                .first(conn)
                .optional()?;
            tier.map(|t| Some(t.id))
                .ok_or_else(|| PricingError::TierNotFound(name.clone()))
        }
        None => Ok(None),
    }
}

/// A tier-scoped row overrides the default (tier-null) row for the same
/// product key.
fn lookup_product(
    conn: &mut PgConnection,
    product_key: &str,
    tier_id: Option<Uuid>,
) -> PricingResult<Option<ProductPricing>> {
    if let Some(tier_id) = tier_id {
        let scoped: Option<ProductPricing> = product_pricing::table
            .filter(product_pricing::product_key.eq(product_key))
            .filter(product_pricing::pricing_tier_id.eq(tier_id))
            .filter(product_pricing::is_active.eq(true))
            .first(conn)
            .optional()?;
        if scoped.is_some() {
            return Ok(scoped);
        }
    }

    let default: Option<ProductPricing> = product_pricing::table
        .filter(product_pricing::product_key.eq(product_key))
        .filter(product_pricing::pricing_tier_id.is_null())
        .filter(product_pricing::is_active.eq(true))
        .first(conn)
        .optional()?;
    Ok(default)
}

fn base_amount(product: &ProductPricing, quantity: i32) -> f64 {
    match (
        product.minimum_quantity,
        product.minimum_price,
        product.per_unit_price,
    ) {
        (Some(min_qty), Some(min_price), Some(per_unit)) => quantity_tier_amount(
            min_qty,
            min_price,
            per_unit,
            product.maximum_quantity,
            quantity,
        ),
        _ => product.price,
    }
}

/// Quantity-tier pricing: everything up to the minimum quantity costs the
/// minimum price; each unit beyond it costs `per_unit_price`, with the
/// billable quantity capped at `maximum_quantity`.
pub fn quantity_tier_amount(
    minimum_quantity: i32,
    minimum_price: f64,
    per_unit_price: f64,
    maximum_quantity: Option<i32>,
    quantity: i32,
) -> f64 {
    let capped = match maximum_quantity {
        Some(max) => quantity.min(max),
        None => quantity,
    };
    if capped <= minimum_quantity {
        minimum_price
    } else {
        minimum_price + f64::from(capped - minimum_quantity) * per_unit_price
    }
}

fn vp_product_keys(vp: &VpAddOns) -> Vec<&'static str> {
    let mut keys = Vec::new();
    if vp.ar_upgrade {
        keys.push(VP_AR_UPGRADE_KEY);
    }
    if vp.ar_virtual_prototype {
        keys.push(VP_AR_VIRTUAL_PROTOTYPE_KEY);
    }
    match vp.animated_video.as_deref() {
        Some("rotation") => keys.push(VP_ANIMATED_VIDEO_ROTATION_KEY),
        Some("exploded") => keys.push(VP_ANIMATED_VIDEO_EXPLODED_KEY),
        Some("both") => keys.push(VP_ANIMATED_VIDEO_BOTH_KEY),
        _ => {}
    }
    keys
}

pub fn humanize_key(product_key: &str) -> String {
    product_key
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dollars to integer cents, rounded once at the payment-intent boundary.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
