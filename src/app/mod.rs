pub mod auth;
pub mod comments;
pub mod engagement;
pub mod enrichment;
pub mod posts;
pub mod rate_limiter;
pub mod search;
pub mod tokens;
pub mod users;
pub mod views;

/// Outcome of an owner-only write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    Done(T),
    NotFound,
    Forbidden,
}
