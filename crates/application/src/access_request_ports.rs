mod change_feed;
mod store;

pub use change_feed::ChangeFeed;
pub use store::{AccessRequestStore, ConditionalWrite, PageRequest, RecordPage};
