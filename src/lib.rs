//! orgsync - reconcile a department tree and user roster from CSV files
//! into a Yandex 360 organization directory.
//!
//! The pipeline is: [`config`] → [`loader`] → [`resolver`] →
//! [`reconcile::Reconciler`] driving an [`api::Directory`].

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod models;
pub mod reconcile;
pub mod resolver;
