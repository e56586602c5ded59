mod info;
mod invoke;
mod matrix;
mod rejoin;
mod run;

pub use info::cmd_info;
pub use invoke::cmd_invoke;
pub use matrix::cmd_matrix;
pub use rejoin::cmd_rejoin;
pub use run::cmd_run;
