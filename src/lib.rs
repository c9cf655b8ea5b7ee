pub mod aligner;
pub mod analysis;
pub mod catalog;
pub mod cif;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod predictions;
pub mod provenance;
pub mod query;
