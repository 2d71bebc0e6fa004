use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use backend::auth::jwt::JwtService;
use backend::config::AppConfig;
use backend::db::{self, PgPool};
use backend::gateway::{CreatedIntent, IntentDetails, IntentRequest, PaymentGateway};
use backend::mailer::EmailSender;
use backend::models::{NewEmailTemplate, NewProductPricing, NewUser, OutboxJob};
use backend::routes;
use backend::state::AppState;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Default)]
pub struct FakeGateway {
    intents: Mutex<HashMap<String, IntentDetails>>,
    counter: AtomicUsize,
}

impl FakeGateway {
    /// Registers an intent as if it had been created out of band, e.g.
    /// to simulate a gateway reporting a non-succeeded status.
    #[allow(dead_code)]
    pub async fn seed_intent(
        &self,
        id: &str,
        status: &str,
        amount_cents: i64,
        metadata: HashMap<String, String>,
    ) {
        let mut guard = self.intents.lock().await;
        guard.insert(
            id.to_string(),
            IntentDetails {
                id: id.to_string(),
                status: status.to_string(),
                amount_cents,
                metadata,
            },
        );
    }

    #[allow(dead_code)]
    pub async fn set_status(&self, id: &str, status: &str) {
        let mut guard = self.intents.lock().await;
        if let Some(intent) = guard.get_mut(id) {
            intent.status = status.to_string();
        }
    }

    #[allow(dead_code)]
    pub async fn intent(&self, id: &str) -> Option<IntentDetails> {
        let guard = self.intents.lock().await;
        guard.get(id).cloned()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<CreatedIntent> {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("pi_test_{sequence}");
        let mut guard = self.intents.lock().await;
        guard.insert(
            id.clone(),
            IntentDetails {
                id: id.clone(),
                status: "succeeded".to_string(),
                amount_cents: request.amount_cents,
                metadata: request.metadata,
            },
        );
        Ok(CreatedIntent {
            client_secret: format!("{id}_secret"),
            id,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentDetails> {
        let guard = self.intents.lock().await;
        guard
            .get(intent_id)
            .cloned()
            .ok_or_else(|| anyhow!("intent {intent_id} missing"))
    }
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: AtomicBool,
}

impl FakeMailer {
    #[allow(dead_code)]
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    #[allow(dead_code)]
    pub fn fail_next_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmailSender for FakeMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("simulated mail API outage");
        }
        let mut guard = self.sent.lock().await;
        guard.push((to.to_string(), subject.to_string(), html.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    gateway: Arc<FakeGateway>,
    mailer: Arc<FakeMailer>,
}

impl TestApp {
    /// Returns `None` when `TEST_DATABASE_URL` is not set so the suite
    /// degrades to a skip instead of failing on machines without
    /// Postgres.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            return Ok(None);
        };

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            package_token_audience: "test-package".to_string(),
            package_token_expiry_days: 90,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            stripe_secret_key: "sk_test_unused".to_string(),
            stripe_api_base: "http://localhost:0".to_string(),
            currency: "usd".to_string(),
            mail_api_endpoint: None,
            mail_api_key: None,
            mail_from: "no-reply@test.local".to_string(),
            portal_base_url: "http://localhost:3000".to_string(),
            draft_ttl_days: 7,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let gateway = Arc::new(FakeGateway::default());
        let mailer = Arc::new(FakeMailer::default());
        let gateway_for_state: Arc<dyn PaymentGateway> = gateway.clone();
        let mailer_for_state: Arc<dyn EmailSender> = mailer.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, gateway_for_state, mailer_for_state, jwt);
        let router = routes::create_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            gateway,
            mailer,
        }))
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    pub fn gateway(&self) -> Arc<FakeGateway> {
        self.gateway.clone()
    }

    #[allow(dead_code)]
    pub fn mailer(&self) -> Arc<FakeMailer> {
        self.mailer.clone()
    }

    pub async fn insert_user(&self, email: &str, password: &str, role: &str) -> Result<Uuid> {
        let email = email.to_string();
        let password = password.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let password_hash = backend::auth::password::hash_password(&password)?;
            let user = NewUser {
                id: Uuid::new_v4(),
                email: email.clone(),
                full_name: email.split('@').next().unwrap_or("user").to_string(),
                password_hash,
                role,
                phone: None,
                company: None,
            };
            diesel::insert_into(backend::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_product(
        &self,
        product_key: &str,
        pricing_tier_id: Option<Uuid>,
        price: f64,
    ) -> Result<Uuid> {
        let product_key = product_key.to_string();
        self.with_conn(move |conn| {
            let product = NewProductPricing {
                id: Uuid::new_v4(),
                product_key,
                pricing_tier_id,
                price,
                category: "design_services".to_string(),
                minimum_quantity: None,
                minimum_price: None,
                per_unit_price: None,
                maximum_quantity: None,
                is_active: true,
            };
            diesel::insert_into(backend::schema::product_pricing::table)
                .values(&product)
                .execute(conn)
                .context("failed to insert product pricing")?;
            Ok(product.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_quantity_product(
        &self,
        product_key: &str,
        minimum_quantity: i32,
        minimum_price: f64,
        per_unit_price: f64,
        maximum_quantity: Option<i32>,
    ) -> Result<Uuid> {
        let product_key = product_key.to_string();
        self.with_conn(move |conn| {
            let product = NewProductPricing {
                id: Uuid::new_v4(),
                product_key,
                pricing_tier_id: None,
                price: minimum_price,
                category: "design_services".to_string(),
                minimum_quantity: Some(minimum_quantity),
                minimum_price: Some(minimum_price),
                per_unit_price: Some(per_unit_price),
                maximum_quantity,
                is_active: true,
            };
            diesel::insert_into(backend::schema::product_pricing::table)
                .values(&product)
                .execute(conn)
                .context("failed to insert product pricing")?;
            Ok(product.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_tier(&self, name: &str) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let tier = backend::models::NewPricingTier {
                id: Uuid::new_v4(),
                name,
                description: None,
            };
            diesel::insert_into(backend::schema::pricing_tiers::table)
                .values(&tier)
                .execute(conn)
                .context("failed to insert pricing tier")?;
            Ok(tier.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_template(&self, key: &str, subject: &str, body_html: &str) -> Result<Uuid> {
        let key = key.to_string();
        let subject = subject.to_string();
        let body_html = body_html.to_string();
        self.with_conn(move |conn| {
            let template = NewEmailTemplate {
                id: Uuid::new_v4(),
                key,
                subject,
                body_html,
                is_active: true,
            };
            diesel::insert_into(backend::schema::email_templates::table)
                .values(&template)
                .execute(conn)
                .context("failed to insert email template")?;
            Ok(template.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn outbox_jobs_by_type(&self, ty: &str) -> Result<Vec<OutboxJob>> {
        let ty = ty.to_string();
        self.with_conn(move |conn| {
            use backend::schema::outbox_jobs::dsl::{job_type as job_type_col, outbox_jobs};
            let rows = outbox_jobs
                .filter(job_type_col.eq(&ty))
                .load::<OutboxJob>(conn)
                .context("failed to load outbox jobs")?;
            Ok(rows)
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.json_request(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.json_request(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.json_request(Method::PUT, path, payload, token).await
    }

    async fn json_request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE form_drafts, email_logs, outbox_jobs, email_templates, \
         design_package_orders, voucher_usages, payment_line_items, payments, voucher_codes, \
         product_pricing, pricing_tiers, designer_assignments, jobs, refresh_tokens, users \
         RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
