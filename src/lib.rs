//! A client-side HTTP orchestration layer for multiplexing several "business
//! lines" of API traffic behind one request lifecycle: configurable retry,
//! a two-tier response cache, durable request replay via promises, and
//! per-business suspend/resume flow control.
//!
//! Register each business line's [`business::BusinessConfig`] plus its
//! [`interceptor::Interceptor`], [`parser::Parser`], and [`transport::Transport`]
//! implementations with a [`manager::Manager`], then drive every request for
//! that business through [`manager::Manager::send`].

pub mod business;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod error;
pub mod interceptor;
pub mod logging;
pub mod lru;
pub mod manager;
pub mod parser;
pub mod promise;
pub mod request;
pub mod response;
pub mod transport;
pub mod worker;

pub use business::{BusinessConfig, BusinessRecord};
pub use cache::CacheStore;
pub use cancel::CancelToken;
pub use config::ManagerConfig;
pub use error::{ApiError, Error};
pub use interceptor::Interceptor;
pub use manager::Manager;
pub use parser::{DefaultParser, Parser};
pub use promise::PromiseStore;
pub use request::{Body, Method, Request, RequestCore};
pub use response::{RawResponse, Response};
pub use transport::Transport;
