// DriveMonitor - Execution Contexts
//
// One module per thread. Each task exposes `step()` for a single iteration
// and `run()` which loops it until the shared running flag is cleared. On the
// device that flag is never cleared.

pub mod dispatcher;
pub mod processor;
pub mod producer;

pub use dispatcher::Dispatcher;
pub use processor::Processor;
pub use producer::Producer;
