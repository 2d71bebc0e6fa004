use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = jobs)]
#[diesel(belongs_to(User, foreign_key = client_id))]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub client_id: Uuid,
    pub designer_id: Option<Uuid>,
    pub department: Option<String>,
    pub package_type: Option<String>,
    pub is_draft: bool,
    pub archived: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_activity_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub client_id: Uuid,
    pub designer_id: Option<Uuid>,
    pub department: Option<String>,
    pub package_type: Option<String>,
    pub is_draft: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = designer_assignments)]
pub struct DesignerAssignment {
    pub id: Uuid,
    pub job_type: String,
    pub designer_id: Uuid,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = designer_assignments)]
pub struct NewDesignerAssignment {
    pub id: Uuid,
    pub job_type: String,
    pub designer_id: Uuid,
    pub priority: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = pricing_tiers)]
pub struct PricingTier {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = pricing_tiers)]
pub struct NewPricingTier {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = product_pricing)]
#[diesel(belongs_to(PricingTier, foreign_key = pricing_tier_id))]
pub struct ProductPricing {
    pub id: Uuid,
    pub product_key: String,
    pub pricing_tier_id: Option<Uuid>,
    pub price: f64,
    pub category: String,
    pub minimum_quantity: Option<i32>,
    pub minimum_price: Option<f64>,
    pub per_unit_price: Option<f64>,
    pub maximum_quantity: Option<i32>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = product_pricing)]
pub struct NewProductPricing {
    pub id: Uuid,
    pub product_key: String,
    pub pricing_tier_id: Option<Uuid>,
    pub price: f64,
    pub category: String,
    pub minimum_quantity: Option<i32>,
    pub minimum_price: Option<f64>,
    pub per_unit_price: Option<f64>,
    pub maximum_quantity: Option<i32>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = voucher_codes)]
pub struct VoucherCode {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    pub discount_value: f64,
    pub max_uses: Option<i32>,
    pub uses_per_user: Option<i32>,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_until: Option<NaiveDateTime>,
    pub is_active: bool,
    pub used_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = voucher_codes)]
pub struct NewVoucherCode {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    pub discount_value: f64,
    pub max_uses: Option<i32>,
    pub uses_per_user: Option<i32>,
    pub valid_from: Option<NaiveDateTime>,
    pub valid_until: Option<NaiveDateTime>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = voucher_usages)]
#[diesel(belongs_to(VoucherCode, foreign_key = voucher_id))]
#[diesel(belongs_to(User))]
pub struct VoucherUsage {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub user_id: Uuid,
    pub payment_id: Option<Uuid>,
    pub used_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = voucher_usages)]
pub struct NewVoucherUsage {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub user_id: Uuid,
    pub payment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = payments)]
#[diesel(belongs_to(User))]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gateway_intent_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub voucher_id: Option<Uuid>,
    pub discount_amount: f64,
    pub department: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gateway_intent_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub voucher_id: Option<Uuid>,
    pub discount_amount: f64,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = payment_line_items)]
#[diesel(belongs_to(Payment))]
pub struct PaymentLineItem {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub product_key: Option<String>,
    pub label: String,
    pub amount: f64,
    pub quantity: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payment_line_items)]
pub struct NewPaymentLineItem {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub product_key: Option<String>,
    pub label: String,
    pub amount: f64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = design_package_orders)]
#[diesel(belongs_to(Payment))]
pub struct DesignPackageOrder {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub user_id: Uuid,
    pub virtual_prototype_status: String,
    pub sell_sheet_status: String,
    pub sell_sheet_locked: bool,
    pub virtual_prototype_job_id: Option<Uuid>,
    pub sell_sheet_job_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = design_package_orders)]
pub struct NewDesignPackageOrder {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub user_id: Uuid,
    pub virtual_prototype_status: String,
    pub sell_sheet_status: String,
    pub sell_sheet_locked: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = email_templates)]
pub struct EmailTemplate {
    pub id: Uuid,
    pub key: String,
    pub subject: String,
    pub body_html: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = email_templates)]
pub struct NewEmailTemplate {
    pub id: Uuid,
    pub key: String,
    pub subject: String,
    pub body_html: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = email_logs)]
pub struct EmailLog {
    pub id: Uuid,
    pub outbox_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub status: String,
    pub error: Option<String>,
    pub sent_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = email_logs)]
pub struct NewEmailLog {
    pub id: Uuid,
    pub outbox_id: Option<Uuid>,
    pub recipient: String,
    pub subject: String,
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = outbox_jobs)]
pub struct OutboxJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox_jobs)]
pub struct NewOutboxJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = form_drafts)]
#[diesel(belongs_to(User))]
#[diesel(primary_key(user_id, form_id))]
pub struct FormDraft {
    pub user_id: Uuid,
    pub form_id: String,
    pub payload: serde_json::Value,
    pub updated_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = form_drafts)]
pub struct NewFormDraft {
    pub user_id: Uuid,
    pub form_id: String,
    pub payload: serde_json::Value,
    pub updated_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
