//! Email-gated, quota-limited text-to-image bot for Telegram.
//!
//! The binary wires a long-polling [`poller`] to the [`bot::ChatBot`], which
//! routes each message through the pure [`router`] and performs the
//! resulting actions against the [`db`], the [`imagegen`] client and the
//! [`telegram`] sender.

pub mod access;
pub mod bot;
pub mod config;
pub mod db;
pub mod imagegen;
pub mod model;
pub mod poller;
pub mod router;
pub mod session;
pub mod telegram;
pub mod texts;
pub mod tracker;
