mod http;
pub(crate) mod js;
mod local;
mod memory;

pub use http::HttpAdapter;
pub use js::JsAdapter;
pub use local::LocalStorageAdapter;
pub use memory::{MemoryAdapter, Operation};
