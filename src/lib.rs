//! Load-shedding relay controller for ESP32.
//!
//! Measures DC voltage and current, switches the load relay on a fixed power
//! threshold and serves a status page. Everything except the ESP-IDF glue
//! (`hw::init_hw`, `web::start_web`) builds and tests on the host.

mod credentials;

pub mod config;
pub mod control;
pub mod hw;
pub mod net;
pub mod sensor;
pub mod web;
