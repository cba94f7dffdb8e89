pub mod connector_resource;
mod filter;
mod model;
mod paginate;
mod pool;

pub use connector_resource::{
    ConnectorResource, ConnectorResourceImpl, ConnectorResourceStore,
    ListOpts, MemoryStore, MockConnectorResourceStore, UpdateOpts,
};
pub use filter::Filter;
pub use model::{now, ConnectorType, List, State, View, Visibility};
pub use paginate::{page_size, Cursor, MAX_PAGE_SIZE};
pub use pool::{migrate, open_pool};
