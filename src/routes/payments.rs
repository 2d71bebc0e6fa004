use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    gateway::IntentRequest,
    models::{
        DesignPackageOrder, NewDesignPackageOrder, NewPayment, NewPaymentLineItem, Payment,
        PaymentLineItem,
    },
    outbox::{enqueue_job, JOB_SEND_EMAIL},
    pricing::{resolve_pricing, to_cents, QuoteRequest},
    schema::{design_package_orders, payment_line_items, payments},
    state::AppState,
    vouchers::{apply_discount, evaluate_voucher, load_voucher, redeem_voucher, user_usage_count},
    workers::email::SendEmailPayload,
};

use super::jobs::to_iso;
use super::package_orders::{order_to_info, PackageOrderInfo, PACKAGE_STATUS_NOT_STARTED};
use super::pricing::pricing_error_to_app;

pub const GATEWAY_STATUS_SUCCEEDED: &str = "succeeded";
pub const DESIGN_PACKAGE_PRODUCT_KEY: &str = "design_package";
pub const TEMPLATE_DESIGN_PACKAGE_CONFIRMATION: &str = "design_package_confirmation";

const META_USER_ID: &str = "user_id";
const META_EMAIL: &str = "email";
const META_DEPARTMENT: &str = "department";
const META_TIER: &str = "tier";
const META_PRODUCT_KEY: &str = "product_key";
const META_VOUCHER_CODE: &str = "voucher_code";
const META_DISCOUNT_AMOUNT: &str = "discount_amount";
const META_LINE_ITEMS: &str = "line_items";
const META_SUMMARY: &str = "summary";

#[derive(Deserialize)]
pub struct CreateIntentRequest {
    #[serde(flatten)]
    pub quote: QuoteRequest,
    pub voucher_code: Option<String>,
    pub department: Option<String>,
}

#[derive(Serialize)]
pub struct CreateIntentResponse {
    pub intent_id: String,
    pub client_secret: String,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub total_amount: f64,
    pub line_items: Vec<LineItemRecord>,
}

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Serialize)]
pub struct ConfirmPaymentResponse {
    pub payment: PaymentInfo,
    pub line_items: Vec<LineItemInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_order: Option<PackageOrderInfo>,
}

#[derive(Serialize)]
pub struct PaymentInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gateway_intent_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub voucher_id: Option<Uuid>,
    pub discount_amount: f64,
    pub department: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct LineItemInfo {
    pub id: Uuid,
    pub product_key: Option<String>,
    pub label: String,
    pub amount: f64,
    pub quantity: i32,
}

/// Line item as carried on intent metadata and persisted at
/// confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub product_key: Option<String>,
    pub label: String,
    pub amount: f64,
    pub quantity: i32,
}

pub async fn create_intent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateIntentRequest>,
) -> AppResult<Json<CreateIntentResponse>> {
    let mut conn = state.db()?;

    let quote = resolve_pricing(&mut conn, &payload.quote).map_err(pricing_error_to_app)?;
    let subtotal = quote.total_amount;

    let mut discount_amount = 0.0;
    let mut voucher_code = None;
    if let Some(code) = &payload.voucher_code {
        let code = code.trim().to_uppercase();
        let voucher = load_voucher(&mut conn, &code)?;
        let usage = match &voucher {
            Some(voucher) => Some(user_usage_count(&mut conn, voucher.id, user.user_id)?),
            None => None,
        };
        let now = chrono::Utc::now().naive_utc();
        match evaluate_voucher(voucher.as_ref(), now, usage) {
            Ok(discount) => {
                let discounted =
                    apply_discount(subtotal, &discount.discount_type, discount.discount_value);
                discount_amount = subtotal - discounted;
                voucher_code = Some(code);
            }
            Err(rejection) => return Err(AppError::bad_request(rejection.reason())),
        }
    }

    let total_amount = subtotal - discount_amount;

    let line_items: Vec<LineItemRecord> = quote
        .line_items
        .iter()
        .map(|item| LineItemRecord {
            product_key: item.product_key.clone(),
            label: item.label.clone(),
            amount: item.amount,
            quantity: item.quantity,
        })
        .collect();

    // Everything confirmation needs to reconstruct the purchase rides on
    // the intent itself.
    let mut metadata = HashMap::new();
    metadata.insert(META_USER_ID.to_string(), user.user_id.to_string());
    metadata.insert(META_EMAIL.to_string(), user.email.clone());
    metadata.insert(
        META_PRODUCT_KEY.to_string(),
        payload.quote.product_key.clone(),
    );
    if let Some(department) = &payload.department {
        metadata.insert(META_DEPARTMENT.to_string(), department.clone());
    }
    if let Some(tier) = &payload.quote.tier_name {
        metadata.insert(META_TIER.to_string(), tier.clone());
    }
    if let Some(code) = &voucher_code {
        metadata.insert(META_VOUCHER_CODE.to_string(), code.clone());
        metadata.insert(
            META_DISCOUNT_AMOUNT.to_string(),
            format!("{discount_amount:.2}"),
        );
    }
    metadata.insert(
        META_LINE_ITEMS.to_string(),
        serde_json::to_string(&line_items)?,
    );
    metadata.insert(META_SUMMARY.to_string(), summarize_line_items(&line_items));

    let intent = state
        .gateway
        .create_intent(IntentRequest {
            amount_cents: to_cents(total_amount),
            currency: state.config.currency.clone(),
            metadata,
        })
        .await
        .map_err(AppError::from)?;

    Ok(Json(CreateIntentResponse {
        intent_id: intent.id,
        client_secret: intent.client_secret,
        subtotal,
        discount_amount,
        total_amount,
        line_items,
    }))
}

pub async fn confirm(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<(StatusCode, Json<ConfirmPaymentResponse>)> {
    let intent = state
        .gateway
        .retrieve_intent(&payload.payment_intent_id)
        .await
        .map_err(AppError::from)?;

    // The gateway's word is authoritative: nothing is written unless it
    // reports the exact succeeded status.
    if intent.status != GATEWAY_STATUS_SUCCEEDED {
        return Err(AppError::bad_request(format!(
            "payment intent {} is not succeeded (status: {})",
            intent.id, intent.status
        )));
    }

    let mut conn = state.db()?;

    // Re-confirming an already-recorded intent returns the original rows.
    let existing: Option<Payment> = payments::table
        .filter(payments::gateway_intent_id.eq(&intent.id))
        .first(&mut conn)
        .optional()?;
    if let Some(payment) = existing {
        let items: Vec<PaymentLineItem> = payment_line_items::table
            .filter(payment_line_items::payment_id.eq(payment.id))
            .load(&mut conn)?;
        let order: Option<DesignPackageOrder> = design_package_orders::table
            .filter(design_package_orders::payment_id.eq(payment.id))
            .first(&mut conn)
            .optional()?;
        return Ok((
            StatusCode::OK,
            Json(build_response(payment, items, order)),
        ));
    }

    let user_id = intent
        .metadata
        .get(META_USER_ID)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .unwrap_or(user.user_id);
    let recipient = intent
        .metadata
        .get(META_EMAIL)
        .cloned()
        .unwrap_or_else(|| user.email.clone());
    let department = intent.metadata.get(META_DEPARTMENT).cloned();
    let product_key = intent.metadata.get(META_PRODUCT_KEY).cloned();
    let voucher_code = intent.metadata.get(META_VOUCHER_CODE).cloned();
    let discount_amount = intent
        .metadata
        .get(META_DISCOUNT_AMOUNT)
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(0.0);

    let amount = intent.amount_cents as f64 / 100.0;
    let line_items = reconstruct_line_items(&intent.metadata, amount);

    let voucher = match &voucher_code {
        Some(code) => load_voucher(&mut conn, code)?,
        None => None,
    };

    let currency = state.config.currency.clone();
    let jwt = state.jwt.clone();
    let portal_base_url = state.config.portal_base_url.clone();
    let is_design_package = product_key.as_deref() == Some(DESIGN_PACKAGE_PRODUCT_KEY);

    // One unit of work: a confirmed payment always yields a complete,
    // consistent record set or none at all.
    let (payment, items, package_order) = conn
        .transaction::<(Payment, Vec<PaymentLineItem>, Option<DesignPackageOrder>), AppError, _>(
            |conn| {
                let new_payment = NewPayment {
                    id: Uuid::new_v4(),
                    user_id,
                    gateway_intent_id: intent.id.clone(),
                    amount,
                    currency,
                    status: GATEWAY_STATUS_SUCCEEDED.to_string(),
                    voucher_id: voucher.as_ref().map(|v| v.id),
                    discount_amount,
                    department,
                };
                diesel::insert_into(payments::table)
                    .values(&new_payment)
                    .execute(conn)?;
                let payment: Payment = payments::table.find(new_payment.id).first(conn)?;

                let new_items: Vec<NewPaymentLineItem> = line_items
                    .iter()
                    .map(|item| NewPaymentLineItem {
                        id: Uuid::new_v4(),
                        payment_id: payment.id,
                        product_key: item.product_key.clone(),
                        label: item.label.clone(),
                        amount: item.amount,
                        quantity: item.quantity,
                    })
                    .collect();
                diesel::insert_into(payment_line_items::table)
                    .values(&new_items)
                    .execute(conn)?;
                let items: Vec<PaymentLineItem> = payment_line_items::table
                    .filter(payment_line_items::payment_id.eq(payment.id))
                    .load(conn)?;

                if let Some(voucher) = &voucher {
                    redeem_voucher(conn, voucher.id, user_id, payment.id)?;
                }

                let package_order = if is_design_package {
                    let new_order = NewDesignPackageOrder {
                        id: Uuid::new_v4(),
                        payment_id: payment.id,
                        user_id,
                        virtual_prototype_status: PACKAGE_STATUS_NOT_STARTED.to_string(),
                        sell_sheet_status: PACKAGE_STATUS_NOT_STARTED.to_string(),
                        sell_sheet_locked: true,
                    };
                    diesel::insert_into(design_package_orders::table)
                        .values(&new_order)
                        .execute(conn)?;
                    let order: DesignPackageOrder = design_package_orders::table
                        .find(new_order.id)
                        .first(conn)?;

                    // The confirmation email is an outbox row in the same
                    // transaction; delivery is the worker's problem and a
                    // failed send can never undo the payment.
                    match jwt.generate_package_token(order.id, user_id) {
                        Ok(token) => {
                            let access_url = format!(
                                "{portal_base_url}/package-orders/claim/{token}"
                            );
                            let email_payload = SendEmailPayload {
                                template_key: TEMPLATE_DESIGN_PACKAGE_CONFIRMATION.to_string(),
                                recipient: recipient.clone(),
                                params: HashMap::from([
                                    ("access_url".to_string(), access_url),
                                    ("amount".to_string(), format!("{:.2}", payment.amount)),
                                ]),
                            };
                            enqueue_job(
                                conn,
                                JOB_SEND_EMAIL,
                                serde_json::to_value(&email_payload)?,
                                None,
                            )?;
                        }
                        Err(err) => {
                            warn!(order_id = %order.id, error = %err, "failed to sign package access token; skipping confirmation email");
                        }
                    }

                    Some(order)
                } else {
                    None
                };

                Ok((payment, items, package_order))
            },
        )?;

    Ok((
        StatusCode::CREATED,
        Json(build_response(payment, items, package_order)),
    ))
}

fn build_response(
    payment: Payment,
    items: Vec<PaymentLineItem>,
    package_order: Option<DesignPackageOrder>,
) -> ConfirmPaymentResponse {
    ConfirmPaymentResponse {
        payment: PaymentInfo {
            id: payment.id,
            user_id: payment.user_id,
            gateway_intent_id: payment.gateway_intent_id,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            voucher_id: payment.voucher_id,
            discount_amount: payment.discount_amount,
            department: payment.department,
            created_at: to_iso(payment.created_at),
        },
        line_items: items
            .into_iter()
            .map(|item| LineItemInfo {
                id: item.id,
                product_key: item.product_key,
                label: item.label,
                amount: item.amount,
                quantity: item.quantity,
            })
            .collect(),
        package_order: package_order.map(order_to_info),
    }
}

fn summarize_line_items(items: &[LineItemRecord]) -> String {
    items
        .iter()
        .map(|item| format!("{} (${})", item.label, item.amount))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The structured metadata blob is authoritative; the human-readable
/// summary string is the fallback, and a single catch-all item covers
/// intents carrying neither.
fn reconstruct_line_items(
    metadata: &HashMap<String, String>,
    total_amount: f64,
) -> Vec<LineItemRecord> {
    if let Some(raw) = metadata.get(META_LINE_ITEMS) {
        if let Ok(items) = serde_json::from_str::<Vec<LineItemRecord>>(raw) {
            if !items.is_empty() {
                return items;
            }
        }
    }

    if let Some(summary) = metadata.get(META_SUMMARY) {
        let parsed = parse_summary_line_items(summary);
        if !parsed.is_empty() {
            return parsed;
        }
    }

    vec![LineItemRecord {
        product_key: None,
        label: "Design services".to_string(),
        amount: total_amount,
        quantity: 1,
    }]
}

/// Parses `"Name ($price), Name2 ($price2)"`.
fn parse_summary_line_items(summary: &str) -> Vec<LineItemRecord> {
    summary
        .split("), ")
        .filter_map(|chunk| {
            let chunk = chunk.trim().trim_end_matches(')');
            let (label, amount) = chunk.rsplit_once(" ($")?;
            let amount: f64 = amount.parse().ok()?;
            let label = label.trim();
            (!label.is_empty()).then(|| LineItemRecord {
                product_key: None,
                label: label.to_string(),
                amount,
                quantity: 1,
            })
        })
        .collect()
}
