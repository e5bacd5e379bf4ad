//! proftrack core library: profile collection, decoding, and regression tracking for Go benchmarks.

mod change;
mod ci_gate;
mod config;
mod cost_table;
mod discovery;
mod filter;
mod layout;
mod pipeline;
mod pprof;
mod profile_type;
mod report;
mod text_table;
mod toolchain;
mod tools;

mod platform {
    pub mod error;
    pub mod fsutil;
}

mod cmd {
    pub mod collect_cmd;
    pub mod inspect_cmd;
    pub mod tools_cmd;
    pub mod track_cmd;
}

pub use change::*;
pub use ci_gate::*;
pub use cmd::collect_cmd::*;
pub use cmd::inspect_cmd::*;
pub use cmd::tools_cmd::*;
pub use cmd::track_cmd::*;
pub use config::*;
pub use cost_table::*;
pub use discovery::*;
pub use filter::*;
pub use layout::*;
pub use pipeline::*;
pub use platform::error::*;
pub use platform::fsutil::*;
pub use pprof::*;
pub use profile_type::*;
pub use report::*;
pub use text_table::*;
pub use toolchain::*;
pub use tools::*;
