//! # Repository Module
//!
//! Database repository implementations for the back office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Request handler                                                       │
//! │       │                                                                 │
//! │       │  db.sales().create_sale(&seller, &requests)                    │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── create_sale / edit_sale / delete_sale   (one transaction each)    │
//! │  └── list_sales / get_sale / verify_total    (plain reads)             │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - The catalog
//! - [`SaleRepository`](sale::SaleRepository) - The sale ledger
//! - [`UserRepository`](user::UserRepository) - Accounts and permissions
//! - [`ReportRepository`](report::ReportRepository) - Dashboard figures

pub mod product;
pub mod report;
pub mod sale;
pub mod user;
