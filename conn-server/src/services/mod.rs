pub mod connector_resources;
pub mod occupancy;
pub mod state;
