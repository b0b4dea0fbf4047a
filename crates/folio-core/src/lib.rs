//! Core types and trait definitions for the Folio testimonials board.
//!
//! Validation, the vote toggle engine, identities and the authorization gate
//! live here, next to the [`store::ReviewStore`] trait. No HTTP or database
//! code.

// Trait futures carry explicit `Send` bounds; implementors use `async fn`.
#![allow(async_fn_in_trait)]

pub mod authz;
pub mod contact;
pub mod error;
pub mod identity;
pub mod review;
pub mod store;
pub mod validation;
pub mod vote;

pub use error::{Error, Result};
