//! # Villa Simulation
//!
//! Physical model of a Midea villa energy system.
//!
//! ## Components
//!
//! - **Catalog**: Vendor ratings per hardware tier
//! - **Behavior**: Hour-of-day household load profile used by autopilot
//! - **Thermal**: Building envelope types and the learned thermal fingerprint
//! - **Process**: One-step integration of PV, heat pump, hot water and battery
//!
//! ## Usage
//!
//! ```rust
//! use tasman_energy::simulation::{ProcessSimulator, StepInputs, NOMINAL_STEP};
//!
//! let mut sim = ProcessSimulator::default();
//! let state = sim.step(&StepInputs::default(), NOMINAL_STEP);
//! assert!(state.battery_soc_percent >= 10.0);
//! ```

pub mod behavior;
pub mod catalog;
pub mod process;
pub mod thermal;

pub use behavior::*;
pub use catalog::*;
pub use process::*;
pub use thermal::*;
