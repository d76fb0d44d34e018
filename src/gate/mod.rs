//! Request gatekeeper
//!
//! Composes locale resolution, rate limiting, session presence, RBAC and
//! access control into one verdict per request.
//!
//! ## Verdicts
//!
//! | Verdict    | Effect                                        |
//! |------------|-----------------------------------------------|
//! | `Allow`    | forward to the application unchanged          |
//! | `Redirect` | 307 to a locale-prefixed page                 |
//! | `Rewrite`  | forward with the path replaced                |
//! | `Reject`   | terminal response (401/403/429/503, OPTIONS)  |

pub mod context;
pub mod fallback;
pub mod pipeline;
pub mod verdict;

pub use context::{RequestContext, RequestContextBuilder, TrustedProxies, client_ip};
pub use fallback::{FallbackStrategy, is_mutating};
pub use pipeline::{Gatekeeper, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};
pub use verdict::{
    DecisionNotes, DenyReason, GateDecision, GateVerdict, ResourceClass, VerdictKind,
};
