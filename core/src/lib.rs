pub mod access;
pub mod billing;
pub mod config;
pub mod customer;
pub mod error;
pub mod event;
pub mod ledger;
pub mod name_generator;
pub mod report;
pub mod rng;
pub mod seed;
pub mod service;
pub mod store;
pub mod tariff;
pub mod types;
