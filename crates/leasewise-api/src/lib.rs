//! JSON REST API for Leasewise.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`RenewalStore`] and [`NotificationStore`]. Authentication and transport
//! concerns are the caller's responsibility: the caller must attach a
//! [`PmIdentity`] to every request that reaches a write endpoint.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", leasewise_api::api_router(store.clone()))
//! ```

pub mod acknowledgement;
pub mod error;
pub mod etag;
pub mod identity;
pub mod notifications;
pub mod renewals;
pub mod scorecards;
mod workflow;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use leasewise_core::{notify::NotificationStore, store::RenewalStore};

pub use error::ApiError;
pub use identity::{CurrentPm, PmIdentity};
pub use workflow::sweep_alerts;

/// Build the API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RenewalStore + NotificationStore + 'static,
{
  Router::new()
    // Renewals
    .route("/renewals", get(renewals::list::<S>).post(renewals::create::<S>))
    .route("/renewals/{id}", get(renewals::get_one::<S>))
    .route("/renewals/{id}/transitions", get(renewals::transitions::<S>))
    .route("/renewals/{id}/transition", post(renewals::transition::<S>))
    .route("/renewals/{id}/agreement", post(renewals::upload_agreement::<S>))
    .route(
      "/renewals/{id}/alerts/{index}/read",
      post(renewals::mark_alert_read::<S>),
    )
    .route("/renewals/{id}/score", get(renewals::score::<S>))
    // Owner acknowledgement
    .route(
      "/renewals/{id}/acknowledgement/request",
      post(acknowledgement::request::<S>),
    )
    .route(
      "/renewals/{id}/acknowledgement/respond",
      post(acknowledgement::respond::<S>),
    )
    // Leaderboard
    .route("/scorecards", get(scorecards::handler::<S>))
    // Notifications
    .route(
      "/notifications",
      get(notifications::list::<S>).delete(notifications::clear::<S>),
    )
    .route("/notifications/read-all", post(notifications::mark_all_read::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
