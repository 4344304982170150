//! Lead distribution: rule matching and assignee selection.

pub mod cursor;
pub mod router;
pub mod selector;

pub use cursor::{CursorScope, GlobalCursor, PerRuleCursor, RoundRobinCursor};
pub use router::{order_rules, plan_route, RouteCandidate, RouteDecision, RouteStage};
pub use selector::{least_loaded, weighted_pick, AssignmentSelector};
