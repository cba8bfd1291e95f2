#[macro_use]
extern crate rocket;

#[macro_use]
extern crate hiro_system_kit;

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate lazy_static;

extern crate serde;

pub extern crate hex;
pub extern crate rusqlite;

#[macro_use]
pub mod utils;

pub mod chainhook;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod ord;
pub mod service;

pub use error::IndexerError;
