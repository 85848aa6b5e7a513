use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use defectdesk::config::AppConfig;
use defectdesk::db::{self, PgPool};
use defectdesk::models::NewStatus;
use defectdesk::routes;
use defectdesk::state::AppState;
use defectdesk::storage::{ObjectStorage, StorageError, StorageResult};
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

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    bucket_missing: AtomicBool,
}

impl FakeStorage {
    fn check_bucket(&self) -> StorageResult<()> {
        if self.bucket_missing.load(Ordering::SeqCst) {
            return Err(StorageError::BucketMissing {
                bucket: "test-bucket".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> StorageResult<()> {
        self.check_bucket()?;
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()> {
        self.check_bucket()?;
        if keys.is_empty() {
            return Err(StorageError::Other(anyhow!(
                "delete_objects called with an empty key list"
            )));
        }
        let mut guard = self.objects.lock().await;
        for key in keys {
            guard.remove(key);
        }
        Ok(())
    }

    async fn presign_get_object(
        &self,
        key: &str,
        expires_in: Duration,
        download_name: Option<&str>,
    ) -> StorageResult<String> {
        self.check_bucket()?;
        let guard = self.objects.lock().await;
        if !guard.contains_key(key) {
            return Err(StorageError::Other(anyhow!("object {key} missing")));
        }
        let suffix = download_name
            .map(|name| format!("&download_as={name}"))
            .unwrap_or_default();
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}{suffix}",
            expires_in.as_secs()
        ))
    }
}

impl FakeStorage {
    /// Makes every storage call fail as if the configured bucket were
    /// absent from the deployment.
    #[allow(dead_code)]
    pub fn simulate_missing_bucket(&self) {
        self.bucket_missing.store(true, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

impl TestApp {
    /// Returns `None` when TEST_DATABASE_URL is unset so the suite can
    /// skip database-backed scenarios on machines without Postgres.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return Ok(None);
        };

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let state = AppState::new(pool.clone(), config, storage_for_state);
        let router = routes::create_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            storage,
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
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    /// Seeds one status row and returns its id.
    pub async fn insert_status(&self, entity: &str, name: &str, kind: &str) -> Result<Uuid> {
        let entity = entity.to_string();
        let name = name.to_string();
        let kind = kind.to_string();
        self.with_conn(move |conn| {
            let status = NewStatus {
                id: Uuid::new_v4(),
                entity,
                name,
                color: None,
                kind,
            };
            diesel::insert_into(defectdesk::schema::statuses::table)
                .values(&status)
                .execute(conn)
                .context("failed to insert status")?;
            Ok(status.id)
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn delete_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::DELETE, path, payload).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn upload_file(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))?;
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

#[allow(dead_code)]
pub async fn json_body(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    ensure!(!bytes.is_empty(), "expected a non-empty response body");
    Ok(serde_json::from_slice(&bytes)?)
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
        "TRUNCATE TABLE claim_attachments, defect_attachments, ticket_attachments, \
         letter_attachments, court_case_attachments, attachments, claim_links, letter_links, \
         ticket_links, claim_defects, claim_units, court_cases, letters, tickets, defects, \
         claims, units, statuses RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
