//! # Trimbot
//!
//! A chat bot for a small admin group: admins send videos, the bot queues
//! them, cuts the configured time range out of each one with ffmpeg (stream
//! copy, no re-encoding) and replies with the trimmed file.
//!
//! Jobs are handled strictly one at a time by [`worker::Worker`]. Every
//! in-flight job is registered in a [`registry::TaskRegistry`] under a short
//! token so an admin can cancel it with `/cancel <token>`.

pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod health;
pub mod job;
pub mod progress;
pub mod queue;
pub mod registry;
pub mod settings;
pub mod telegram;
pub mod worker;
