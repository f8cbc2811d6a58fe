pub mod article;
pub mod listing;
pub mod pagination;

pub use article::source_links;
pub use listing::{ArticleRef, ListingExtractor};
pub use pagination::last_page;
