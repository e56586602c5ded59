//! fanout-lib: build-argument fan-out and side-effect synchronization.
//!
//! A build statement invoked with repeated `key=value` arguments runs once per
//! combination of those values:
//! - `args`: parsing `(target args..)` invocations, repairing split tokens, and
//!   expanding arguments into an [`args::ArgMatrix`]
//! - `execute`: running one branch per combination and joining their side
//!   effects
//! - `wait`: the [`wait::WaitBlock`] that orders `RUN` and `SAVE IMAGE --push`
//!   side effects and resolves them against a [`wait::BuildResolver`]
//! - `platform` / `image`: target platforms and pushed image descriptors

pub mod args;
pub mod consts;
pub mod execute;
pub mod image;
pub mod platform;
pub mod util;
pub mod wait;
