//! Command implementations for xtask
//!
//! Each command is a separate module that implements its own CLI args and execution logic.

mod golden;
mod read_record;
mod record_pig;

pub use golden::Golden;
pub use read_record::ReadRecord;
pub use record_pig::RecordPig;
