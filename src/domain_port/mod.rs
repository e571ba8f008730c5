mod chat_gateway;
mod engagement;
mod error;
mod page_source;

pub use chat_gateway::*;
pub use engagement::*;
pub use error::*;
pub use page_source::*;
