//! Herdwatch - Livestock Telemetry Server
//!
//! This crate provides the server side of the herd dashboard:
//! - Telemetry normalization for collar readings
//! - A fan-out bridge from one MQTT subscription to live-view WebSockets
//! - Geofence editing, persistence, and the simulated herd
//! - A collar simulator for bench testing

// Collar reading model
pub mod telemetry;

// Upstream-to-session relay
pub mod bridge;

// Operator geofence workflow
pub mod geofence;

// HTTP and WebSocket server
pub mod server;

// Layered settings
pub mod config;

// Collar simulator
pub mod simulator;
