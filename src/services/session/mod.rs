pub mod builders;
pub mod model;

pub use model::{Session, SessionDraft, SessionMeta};
