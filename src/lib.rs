//! Data model and navigation engine behind the budget mind map.
//!
//! Raw JSON is sanitized into a canonical [`tree::BudgetTree`], totals are
//! derived by [`aggregate`], a flat [`index::SearchIndex`] backs name search, and
//! a [`navigator::Navigator`] keeps the drill-down back-stack. Rendering and note
//! persistence sit behind the [`render::Renderer`] and [`notes::NotesBackend`] traits.

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod format;
pub mod index;
pub mod loader;
pub mod logging;
pub mod navigator;
pub mod notes;
pub mod render;
pub mod sanitize;
pub mod session;
pub mod tree;

pub use dataset::{Dataset, DatasetOrigin, DatasetSummary};
pub use error::{LoadError, NavigationError, NotesError, SanitizeError};
pub use index::{SearchEntry, SearchIndex};
pub use navigator::{NavigationFrame, Navigator};
pub use sanitize::{sanitize, Sanitizer};
pub use tree::{BudgetNode, BudgetTree};
