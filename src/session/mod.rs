// Session module
// Per-frame orchestration, timing primitives, notifications and the motion trace

pub mod controller;
pub mod notify;
pub mod timing;
pub mod trace;

pub use controller::{SessionConfig, SessionController, SessionMode};
pub use notify::{Notification, NotificationQueue, SessionState};
pub use timing::{Cooldown, Countdown, CountdownTick, SessionClock};
pub use trace::{
    read_trace_file, MotionTrace, TraceConfig, TraceError, TraceEvent, TraceResult, TraceSample,
    TraceWriter,
};
