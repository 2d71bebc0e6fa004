use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NewVoucherUsage, VoucherCode};
use crate::schema::{voucher_codes, voucher_usages};

pub const DISCOUNT_PERCENTAGE: &str = "percentage";
pub const DISCOUNT_FIXED: &str = "fixed";

/// Why a code was rejected. Each check is independent so the caps can be
/// configured (and tested) in isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoucherRejection {
    InvalidCode,
    NotYetValid,
    Expired,
    UsageLimitReached,
    AlreadyUsed,
}

impl VoucherRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            VoucherRejection::InvalidCode => "Invalid voucher code.",
            VoucherRejection::NotYetValid => "Voucher is not yet valid.",
            VoucherRejection::Expired => "Voucher has expired.",
            VoucherRejection::UsageLimitReached => "Voucher usage limit reached.",
            VoucherRejection::AlreadyUsed => "Voucher already used.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VoucherDiscount {
    pub voucher_id: Uuid,
    pub discount_type: String,
    pub discount_value: f64,
}

/// Validates a voucher row without mutating anything. `user_usage_count`
/// is the caller's prior redemption count, when a user is known.
/// Short-circuits on the first failing check, in order: existence/active
/// flag, date window, total usage cap, per-user cap.
pub fn evaluate_voucher(
    voucher: Option<&VoucherCode>,
    now: NaiveDateTime,
    user_usage_count: Option<i64>,
) -> Result<VoucherDiscount, VoucherRejection> {
    let voucher = match voucher {
        Some(v) if v.is_active => v,
        _ => return Err(VoucherRejection::InvalidCode),
    };

    if let Some(valid_from) = voucher.valid_from {
        if valid_from > now {
            return Err(VoucherRejection::NotYetValid);
        }
    }

    if let Some(valid_until) = voucher.valid_until {
        if valid_until < now {
            return Err(VoucherRejection::Expired);
        }
    }

    if let Some(max_uses) = voucher.max_uses {
        if voucher.used_count >= max_uses {
            return Err(VoucherRejection::UsageLimitReached);
        }
    }

    if let (Some(per_user), Some(count)) = (voucher.uses_per_user, user_usage_count) {
        if count >= i64::from(per_user) {
            return Err(VoucherRejection::AlreadyUsed);
        }
    }

    Ok(VoucherDiscount {
        voucher_id: voucher.id,
        discount_type: voucher.discount_type.clone(),
        discount_value: voucher.discount_value,
    })
}

/// Discounted total, floored at zero.
pub fn apply_discount(subtotal: f64, discount_type: &str, discount_value: f64) -> f64 {
    let discounted = match discount_type {
        DISCOUNT_FIXED => subtotal - discount_value,
        DISCOUNT_PERCENTAGE => subtotal * (1.0 - discount_value / 100.0),
        _ => subtotal,
    };
    discounted.max(0.0)
}

pub fn load_voucher(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<VoucherCode>, diesel::result::Error> {
    voucher_codes::table
        .filter(voucher_codes::code.eq(code))
        .first(conn)
        .optional()
}

pub fn user_usage_count(
    conn: &mut PgConnection,
    voucher_id: Uuid,
    user_id: Uuid,
) -> Result<i64, diesel::result::Error> {
    voucher_usages::table
        .filter(voucher_usages::voucher_id.eq(voucher_id))
        .filter(voucher_usages::user_id.eq(user_id))
        .count()
        .get_result(conn)
}

/// Records an actual redemption. Runs inside the payment-confirmation
/// transaction so the counter and the usage row move together.
pub fn redeem_voucher(
    conn: &mut PgConnection,
    voucher_id: Uuid,
    user_id: Uuid,
    payment_id: Uuid,
) -> Result<(), diesel::result::Error> {
    diesel::update(voucher_codes::table.find(voucher_id))
        .set(voucher_codes::used_count.eq(voucher_codes::used_count + 1))
        .execute(conn)?;

    let usage = NewVoucherUsage {
        id: Uuid::new_v4(),
        voucher_id,
        user_id,
        payment_id: Some(payment_id),
    };
    diesel::insert_into(voucher_usages::table)
        .values(&usage)
        .execute(conn)?;

    Ok(())
}
