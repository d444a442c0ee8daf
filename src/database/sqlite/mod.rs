use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::RagError;
use crate::config::{Config, DistanceMetric};
use crate::database::sqlite::models::{PassageMatch, StatementResult, StoredPassage};
use crate::database::sqlite::queries::{ConsoleQueries, PassageQueries};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

const DIMENSION_KEY: &str = "embedding_dimension";
const METRIC_KEY: &str = "distance_metric";

/// Lazily opened vector database, shared by everything that holds the same `Arc`.
///
/// The first call to [`VectorDatabase::handle`] opens the file and bootstraps the
/// schema; concurrent first callers wait on the same initialisation.
#[derive(Debug)]
pub struct VectorDatabase {
    path: PathBuf,
    dimension: u32,
    metric: DistanceMetric,
    database: OnceCell<Database>,
}

impl VectorDatabase {
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P, dimension: u32, metric: DistanceMetric) -> Self {
        Self {
            path: path.into(),
            dimension,
            metric,
            database: OnceCell::new(),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.database_path(),
            config.provider.embedding_dimension,
            config.database.distance_metric,
        )
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.database.initialized()
    }

    /// The shared database, opening and bootstrapping it on first use
    #[inline]
    pub async fn handle(&self) -> Result<&Database> {
        self.database
            .get_or_try_init(|| Database::open(&self.path, self.dimension, self.metric))
            .await
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
    dimension: u32,
    metric: DistanceMetric,
}

impl Database {
    /// Open (or create) the database file and bootstrap the schema.
    ///
    /// Fails if the file was created with a different embedding dimension.
    pub async fn open(path: &Path, dimension: u32, metric: DistanceMetric) -> Result<Self> {
        register_vector_extension();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let mut database = Self {
            pool,
            dimension,
            metric,
        };
        database.run_migrations().await?;
        database.bootstrap_index().await?;

        info!(
            "Opened vector database at {} ({} dimensions, {} distance)",
            path.display(),
            database.dimension,
            database.metric
        );
        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub async fn run_migrations(&self) -> Result<()> {
        debug!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Record the dimension and metric on first use and create the vec0 index with them.
    /// An existing database keeps its metric; a dimension change is an error.
    async fn bootstrap_index(&mut self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin bootstrap transaction")?;

        let stored_dimension: Option<String> =
            sqlx::query_scalar("SELECT value FROM store_metadata WHERE key = ?")
                .bind(DIMENSION_KEY)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to read stored embedding dimension")?;

        match stored_dimension {
            Some(stored) => {
                let stored: u32 = stored
                    .parse()
                    .with_context(|| format!("Corrupt stored embedding dimension: {stored}"))?;
                if stored != self.dimension {
                    return Err(RagError::Config(format!(
                        "database was created for {stored}-dimensional embeddings but {} are configured",
                        self.dimension
                    ))
                    .into());
                }

                let stored_metric: Option<String> =
                    sqlx::query_scalar("SELECT value FROM store_metadata WHERE key = ?")
                        .bind(METRIC_KEY)
                        .fetch_optional(&mut *tx)
                        .await
                        .context("Failed to read stored distance metric")?;
                if let Some(stored_metric) = stored_metric {
                    self.metric = if stored_metric == DistanceMetric::Cosine.as_sql() {
                        DistanceMetric::Cosine
                    } else {
                        DistanceMetric::L2
                    };
                }
            }
            None => {
                info!(
                    "Initialising vector store with {} dimensions",
                    self.dimension
                );
                sqlx::query("INSERT INTO store_metadata (key, value) VALUES (?, ?), (?, ?)")
                    .bind(DIMENSION_KEY)
                    .bind(self.dimension.to_string())
                    .bind(METRIC_KEY)
                    .bind(self.metric.as_sql())
                    .execute(&mut *tx)
                    .await
                    .context("Failed to record vector store settings")?;
            }
        }

        // Dimension and metric come from validated configuration, not user text
        let ddl = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS passage_index USING vec0(embedding float[{}] distance_metric={})",
            self.dimension,
            self.metric.as_sql()
        );
        sqlx::query(&ddl)
            .execute(&mut *tx)
            .await
            .context("Failed to create similarity index")?;

        tx.commit()
            .await
            .context("Failed to commit bootstrap transaction")?;
        Ok(())
    }

    /// Insert a passage; the embedding length must match the configured dimension
    pub async fn insert_passage(&self, content: &str, embedding: &[f32]) -> Result<StoredPassage> {
        self.check_dimension(embedding)?;

        let id = PassageQueries::create(&self.pool, content, embedding).await?;
        PassageQueries::get_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve inserted passage {id}"))
    }

    pub async fn nearest_passages(
        &self,
        embedding: &[f32],
        limit: u32,
    ) -> Result<Vec<PassageMatch>> {
        self.check_dimension(embedding)?;
        PassageQueries::nearest(&self.pool, embedding, limit).await
    }

    pub async fn get_passage(&self, id: i64) -> Result<Option<StoredPassage>> {
        PassageQueries::get_by_id(&self.pool, id).await
    }

    pub async fn list_passages(&self, limit: u32) -> Result<Vec<StoredPassage>> {
        PassageQueries::list_recent(&self.pool, limit).await
    }

    pub async fn count_passages(&self) -> Result<i64> {
        PassageQueries::count(&self.pool).await
    }

    /// Generic SQL entry point used by the console
    pub async fn execute_sql(&self, sql: &str) -> Result<Vec<StatementResult>> {
        ConsoleQueries::execute(&self.pool, sql).await
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension as usize {
            return Err(RagError::Database(format!(
                "embedding has {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            ))
            .into());
        }
        Ok(())
    }
}

/// Register sqlite-vec for every connection opened afterwards in this process
fn register_vector_extension() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        // SAFETY: `sqlite3_vec_init` is the extension entry point statically linked by the
        // sqlite-vec crate; sqlite calls it with the auto-extension signature.
        unsafe {
            libsqlite3_sys::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
        debug!("Registered sqlite-vec extension");
    });
}
