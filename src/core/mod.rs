pub mod error;
pub mod extractor;
pub mod metadata;
pub mod session;

pub use error::{Result, ScrapeError};
pub use extractor::{first_match, Strategy};
pub use metadata::{
    CatalogEntry, ContentSlug, ContentType, MetaRecord, PlayerState, ServerOption, ServerStream,
    StreamRecord, Video, ID_PREFIX,
};
pub use session::{PageSession, SessionBackend, SessionManager};
