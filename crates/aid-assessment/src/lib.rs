//! Student financial-aid assessment: the award calculator, the disbursement scheduler,
//! and the workflow that coordinates supporting parties and income verification before
//! each calculation.

pub mod calculator;
pub mod config;
pub mod disbursement;
pub mod error;
pub mod telemetry;
pub mod workflow;
