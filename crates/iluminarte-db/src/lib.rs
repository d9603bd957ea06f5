//! # iluminarte-db: Database Layer for the Iluminarte Back Office
//!
//! SQLite storage for the catalog, the sale ledger, the account directory
//! and the dashboard, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Iluminarte Data Flow                              │
//! │                                                                         │
//! │  Web adapter: form::line_requests_from_fields → db.sales().create_sale │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  iluminarte-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo      │    │ 001_initial  │  │   │
//! │  │   │ busy_timeout  │    │ UserRepo      │    │   _schema    │  │   │
//! │  │   │               │    │ ReportRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 SQLite Database (WAL, foreign keys)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration and ledger retry policy
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Catalog, ledger, accounts and reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iluminarte_core::form::line_requests_from_fields;
//! use iluminarte_db::{AppConfig, Database};
//!
//! let db = Database::new(AppConfig::from_env()?.db_config()).await?;
//!
//! let seller = db.users().authenticate("caja1", password).await?.ok_or(Unauthorized)?;
//! let requests = line_requests_from_fields(form_fields);
//! let sale = db.sales().create_sale(&seller, &requests).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError, LedgerConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::user::UserRepository;
