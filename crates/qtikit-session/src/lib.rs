//! Route building and the test-session state machine.
//!
//! A [`Route`] flattens a test definition into the ordered item
//! occurrences one session traverses; [`paths`] enumerates the
//! structurally possible traversals for static analysis; a
//! [`TestSession`] drives a candidate through the route under attempt,
//! feedback, and time constraints.

pub mod clock;
pub mod error;
pub mod paths;
pub mod route;
pub mod session;
pub mod storage;

pub use clock::{ManualClock, SessionClock, SystemClock};
pub use error::{BranchTargetError, SessionError, SessionResult, StorageError};
pub use paths::{longest_paths, possible_paths, shortest_paths, Path};
pub use route::{Route, RouteItem, ScopedLimits};
pub use session::{SessionEvent, SessionSnapshot, SessionState, TestSession};
pub use storage::{MemoryStorage, SessionStorage};
