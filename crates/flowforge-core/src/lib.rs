pub mod alias;
pub mod batch;
pub mod config;
pub mod error;
pub mod io;
pub mod job;
pub mod materialize;
pub mod paths;
pub mod scope;
pub mod sink;
pub mod template;
pub mod template_store;
pub mod types;
pub mod workspace;

pub use error::{FlowError, Result};
