//! # hyperfiled
//!
//! `hyperfiled` is a small HTTP/1.0 file server built around a three-tier
//! dispatch core: an [`server::acceptor_loop`] that owns the listening
//! socket, a [`server::monitor_loop`] that fans accepted connections out to
//! a fixed-size worker pool and supervises worker liveness, and a pool of
//! [`server::worker_loop`] tasks that each run the request
//! validate/parse/dispatch/respond cycle and hot-reload their
//! [`handler`] module between cycles.
//!
//! GET and HEAD requests serve files from a document root; POST requests
//! persist their body into a keyed on-disk [`store`] with a monotonically
//! increasing counter key.

pub mod config;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;
pub mod store;
pub mod util;
