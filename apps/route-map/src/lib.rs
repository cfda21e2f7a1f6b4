pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod geometry;
pub mod interaction;
pub mod layers;
pub mod model;
pub mod session;
pub mod store;
pub mod view;
