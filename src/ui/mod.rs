pub mod embeds;
pub mod interactions;
pub mod paginator;
