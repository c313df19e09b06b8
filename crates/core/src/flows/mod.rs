pub mod engine;
pub mod guards;
pub mod states;

pub use engine::{flow_for, ClosingFlow, DigitalFlow, FlowTransitionError, StaffAssistedFlow};
pub use guards::{GuardIssue, GuardOutcome};
pub use states::{ClosingAction, ClosingContext, ClosingEvent, FlowKind, TransitionOutcome};
