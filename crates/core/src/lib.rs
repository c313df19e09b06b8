pub mod aggregate;
pub mod audit;
pub mod authorize;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod gateway;
pub mod pricing;
pub mod reconcile;
pub mod session;

pub use aggregate::{ClosingAggregator, ClosingView, Slice, SliceRefresh};
pub use authorize::{
    AuthorizationOrchestrator, AuthorizationOutcome, AuthorizationRequest, AuthorizationStage,
    AuthorizeFailure, OptimisticTxn,
};
pub use clock::{Clock, ManualClock, RecordingSleeper, Sleeper, SystemClock, TokioSleeper};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::closing::{
    AdvanceKind, ClosingRecord, CommercialCondition, ConditionId, Contract, Payment,
    PaymentMethodId, TemplateId,
};
pub use domain::promise::{ContactPatch, Promise, RequiredData};
pub use domain::quote::{Quote, QuoteId, QuoteStatus};
pub use domain::{EventId, PromiseId, StudioId};
pub use errors::{ApplicationError, DomainError};
pub use flows::{
    flow_for, ClosingContext, ClosingFlow, DigitalFlow, FlowKind, FlowTransitionError,
    GuardIssue, GuardOutcome, StaffAssistedFlow, TransitionOutcome,
};
pub use gateway::{
    ChangeFeed, ClosingActions, ClosingStore, GatewayError, InMemoryChangeFeed, InMemoryStudio,
};
pub use pricing::{
    compute_breakdown, DeterministicPricingEngine, PriceBreakdown, PricingEngine,
    PricingOverrides,
};
pub use reconcile::{
    classify, ChangeEvent, ChangeKind, ChangeTable, Classification, LockKey, ReconcileOutcome,
    Reconciler, RefetchLocks, RetryPolicy,
};
pub use session::ClosingSession;
