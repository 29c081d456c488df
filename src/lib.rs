pub mod authority;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod merge;
pub mod model;
pub mod output;
pub mod parsers;
pub mod redirect;
pub mod resolver;
pub mod service;
pub mod transport;
