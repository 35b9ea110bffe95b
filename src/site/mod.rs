pub mod error;
pub mod store;
pub mod types;

pub use error::{SiteError, SiteResult};
pub use store::SiteStore;
pub use types::{NewSite, Site};
