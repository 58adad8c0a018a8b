//! Signal-to-order execution gate

mod consumer;
mod coordinator;
mod eligibility;
mod guard;
mod math;
mod outcome;

pub use consumer::{ConsumerStats, ConsumerSummary, SignalConsumer};
pub use coordinator::OrderCreationCoordinator;
pub use eligibility::{
    AccountContext, EligibilityDecision, EligibilityEvaluator, LeveragedContext, SpotContext,
};
pub use guard::{PublicationGuard, SymbolGuards};
pub use math::clamp;
pub use outcome::{DispatchOutcome, FailureKind};
