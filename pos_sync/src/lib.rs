//! Synchronization engine between POS providers (Square, Clover) and the
//! marketplace database.
//!
//! Engines pull catalogs, customers and orders through [`pos_client`], map
//! them into canonical shapes ([`mapper`]) and persist them with diesel over
//! SQLite ([`repo`]). Inbound webhooks ([`webhook`]) and scheduled jobs
//! ([`jobs`]) are the two ways work enters the system; [`http`] and the
//! `pos-sync` binary expose them.

pub mod canonical;
pub mod config;
pub mod context;
pub mod customers;
pub mod db;
pub mod error;
pub mod http;
pub mod inventory;
pub mod jobs;
pub mod locations;
pub mod mapper;
pub mod models;
pub mod money;
pub mod oauth;
pub mod orders;
pub mod providers;
pub mod repo;
pub mod schema;
pub mod tz;
pub mod webhook;

pub use error::{FailureKind, SyncError, SyncResult};
