//! Tool shutdown scheduling stages
//!
//! Two variants share the same bookkeeping: [`EndOfUseShutdown`] cools
//! a tool once its last selection is behind it, [`IdleShutdown`] adds a
//! predictive check that cools a tool ahead of a long idle gap. Both
//! insert the same `M104 T<n> S0` command; they differ in when.

mod end_of_use;
mod estimator;
mod idle;
mod usage;

pub use end_of_use::EndOfUseShutdown;
pub use idle::IdleShutdown;

pub(crate) use estimator::TimeEstimator;
pub(crate) use usage::ToolUsage;

use prepkit_core::gcode::{self, ToolId};

/// Comment-plus-command pair inserted for an end-of-use shutdown.
pub(crate) fn end_of_use_shutdown_lines(tool: ToolId) -> [String; 2] {
    [
        format!("; T{} no longer needed - cooling down", tool),
        gcode::format_tool_temp_command(tool, 0),
    ]
}
