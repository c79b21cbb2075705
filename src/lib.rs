pub mod api;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod fallback;
pub mod history;
pub mod http_client;
pub mod logging;
pub mod model;
pub mod predictor;
pub mod state;
pub mod store;
pub mod worker;
