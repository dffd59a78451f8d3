mod link_gatherer;
mod url_content_getter;

pub use link_gatherer::{LinkGatherer, Page};
pub use url_content_getter::USER_AGENT;
