//! Numeric stages of the pipeline.
//!
//! ```text
//!   column ──► interpolate ──► normality ──┐
//!        │                                 ├──► outliers ──► vif (ols)
//!        └──► periodicity ──► decompose ───┘
//!                              (stl)
//! ```
//!
//! Every function here is pure over slices; per-column parallelism and
//! bookkeeping live in [`crate::state`].

pub mod decompose;
pub mod interpolate;
pub mod normality;
pub mod ols;
pub mod outliers;
pub mod periodicity;
pub mod stl;
pub mod vif;
