pub mod error;
mod rows;
pub mod store;

pub use store::{
    EventMatchFilter, EventRawStream, NewMatch, Page, PgStore, RunFilter, Store,
};
