//! Console and JSON rendering of sync and check results.

pub mod cli;
pub mod colors;

pub use cli::{
    discovery_spinner,
    print_check_line,
    print_check_summary,
    print_json,
    print_outcome,
    print_run_summary,
};
