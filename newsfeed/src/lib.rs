// Library interface for newsfeed modules
// This allows tests and the binaries to import modules

pub mod api;
pub mod artifacts;
pub mod catalog;
pub mod chat;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod selection;

pub use coordinator::{FeedCoordinator, FeedEvent, FeedState};
pub use error::{ApiError, ApiResult};
pub use model::{Article, ArticleId, ArticleKey, Category, CategoryFilter};
