pub mod buffer_pool;
pub mod cache;
pub mod compress;
pub mod config;
pub mod connection;
pub mod fileserve;
pub mod handler;
pub mod http;
pub mod logging;
pub mod master;
pub mod mime;
pub mod path_resolve;
pub mod rate_limit;
pub mod signals;
pub mod worker;
