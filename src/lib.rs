//! Tasman Logic: smart-home energy simulation and advisory engine.
//!
//! Each evaluation cycle derives household load from a behavior profile,
//! advances a PV / battery / heat-pump / hot-water simulation, classifies the
//! tariff window and arbitrates the result into a governance verdict. Around
//! that core sit the user settings store, weather and clock adapters, the
//! natural-language advisor and a small HTTP surface.

pub mod advisor;
pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod forecast;
pub mod settings;
pub mod simulation;
pub mod telemetry;
pub mod time_sync;
