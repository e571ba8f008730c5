mod chat;
mod message;
mod paging;
mod post;
mod stream;
mod timeline;
mod user;

pub use chat::*;
pub use message::*;
pub use paging::*;
pub use post::*;
pub use stream::*;
pub use timeline::*;
pub use user::*;
