pub mod activity;
pub mod cache;
pub mod github;
pub mod summary;
pub mod util;
