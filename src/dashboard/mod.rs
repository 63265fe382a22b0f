pub mod cache;
pub mod session;
pub mod registry;

pub use cache::{SessionCache, SessionSnapshot, ViewState};
pub use registry::SessionRegistry;
pub use session::{Session, SessionDeps};
