pub mod files;
pub mod memory;
pub mod traits;
pub mod types;

pub use files::{FsImageStore, UPLOAD_ROUTE};
pub use memory::MemoryStore;
pub use traits::{
    AgentDirectory, BookingLedger, ImageStore, PropertyStore, StoreError, StoreResult, UserStore,
};
pub use types::{BookingFilter, PropertyFilter};
