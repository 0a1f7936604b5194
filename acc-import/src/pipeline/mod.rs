//! Durable execution of import runs: a transfer step followed by an index
//! step, each retried or failed according to its classification table.

mod classify;
mod queue;
mod step;
mod worker;

pub use classify::{classify, Classification, StepKind};
pub use queue::{Claim, QueueError, RunQueue, RunRecord, RunStatus};
pub use step::{index_step, transfer_step, StepContext, StepError, TransferJob};
pub use worker::Worker;
