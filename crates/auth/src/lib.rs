//! `stockplan-auth` — pure authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. It answers
//! exactly one question: may this principal perform an operation requiring
//! this permission inside its active tenant?

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, Principal, authorize};
pub use permissions::{JOBS_APPROVE, JOBS_WRITE, Permission};
pub use principal::TenantMembership;
pub use roles::Role;
