#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod devices;
pub mod executor;
pub mod registry;
pub mod report;
pub mod runner;
pub mod service;
pub mod storage;
pub mod types;
pub mod utils;
