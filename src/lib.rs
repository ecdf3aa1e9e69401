//! snapharvest - incremental snap and product harvesting.
//!
//! Scrolls listing pages, extracts structured records from detail pages,
//! uploads them with their images to object storage and checkpoints every
//! run so an interrupted process resumes where it stopped.

pub mod backlog;
pub mod checkpoint;
pub mod claimer;
pub mod cli;
pub mod config;
pub mod extract;
pub mod frontier;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod storage;
pub mod upload;
