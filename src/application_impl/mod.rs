mod chat_fake;
mod engagement_fake;
mod feed_fake;
mod page_source_fake;

pub use chat_fake::*;
pub use engagement_fake::*;
pub use feed_fake::*;
pub use page_source_fake::*;
