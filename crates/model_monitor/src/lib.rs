//! Model Monitor workflow client
//!
//! Scripts the managed Model Monitor workflow for a marketplace model: stage
//! datasets, deploy an endpoint with data capture, baseline, schedule hourly
//! monitoring, replay traffic, and tear everything down.

pub mod commands;
pub mod poller;
pub mod state;

#[cfg(test)]
mod testing;
