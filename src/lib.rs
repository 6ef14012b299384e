//! pawgen-publish - publishing backend for the pawgen static site generator
//!
//! Records content digests while output is written, verifies them before
//! anything leaves the machine, and deploys the output tree to Netlify
//! and Cloudflare Pages.

pub mod audit;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod digest;
pub mod error;
pub mod ui;

pub use error::{PublishError, PublishResult};
