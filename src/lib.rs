//! # sheetrag
//!
//! Office documents in, grounded answers out.
//!
//! sheetrag normalizes spreadsheets, slide decks, and word documents into a
//! common JSON shape, splits oversized sheets into size-bounded chunk files,
//! stages and indexes those chunks in SQLite, and at query time packs the
//! best-matching chunks into a single length-budgeted context for a
//! generation model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────────┐
//! │  .xlsx     │──▶│ grid → table │──▶│ chunk files│──▶│ SQLite stage │
//! │  .pptx     │   │ header dedup │   │ + manifests│   │ + FTS5 index │
//! │  .docx     │   │ row chunking │   └────────────┘   └──────┬───────┘
//! └────────────┘   └──────────────┘                          │
//!                                                            ▼
//!                         ┌───────────┐   ┌──────────────────────────┐
//!                         │ generator │◀──│ rank → budgeted context  │
//!                         └───────────┘   └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`grid`] | Merge resolution and cell canonicalization |
//! | [`header`] | Unique column names from a header row |
//! | [`table`] | Row records and delimited rendering |
//! | [`chunk`] | Row-boundary chunk planning |
//! | [`context`] | Ranked hits → budgeted context |
//! | [`extract`] | OOXML readers |
//! | [`parse`] | Document parsing |
//! | [`output`] | Chunk files, manifests, file-name protocol |
//! | [`ingest`] | `srag parse` |
//! | [`stage`] | `srag stage` |
//! | [`index`] | `srag index` |
//! | [`search`] | Search index trait and implementations |
//! | [`generate`] | Generation backends |
//! | [`ask`] | Query-time pipeline |
//! | [`eval`] | Retrieval recall over a question set |
//! | [`retry`] | Bounded retry |
//! | [`config`] | TOML configuration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`models`] | Core data types |
//! | [`error`] | Library error type |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod eval;
pub mod extract;
pub mod generate;
pub mod grid;
pub mod header;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod output;
pub mod parse;
pub mod retry;
pub mod search;
pub mod stage;
pub mod table;
