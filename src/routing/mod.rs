//! Request routing
//!
//! Locale handling, route classification and the static bypass, all operating
//! on plain path strings.
//!
//! ## Example Configuration
//!
//! ```toml
//! [locales]
//! default = "en"
//! supported = ["en", "ru"]
//! prefix = "always"
//!
//! [routes]
//! protected = ["/dashboard", "/profile"]
//! admin = ["/admin"]
//! admin_api = ["/api/admin"]
//!
//! [bypass]
//! patterns = ["^/og/"]
//! ```

pub mod bypass;
pub mod classifier;
pub mod locale;

pub use bypass::{BypassMatch, BypassMatcher, PatternMatcher};
pub use classifier::{RouteClass, RouteClassifier, RoutePatterns};
pub use locale::{LocaleResolver, Negotiation};
