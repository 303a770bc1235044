//! Containr CLI - Docker builds for npm packages.

pub mod commands;
