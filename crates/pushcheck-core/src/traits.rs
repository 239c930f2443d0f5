//! Trait abstractions for the request store and user notifications.
//!
//! The queue worker only depends on these traits, enabling dependency
//! injection and testability with in-memory implementations.

use std::sync::Arc;

use crate::Result;
use crate::outcome::Outcome;
use crate::request::{PushId, PushRequest, RequestId, RequestUpdate, Revision};

/// Access to push requests and pushes.
#[allow(clippy::missing_errors_doc)]
pub trait RequestStore: Send + Sync {
    /// Fetch a request by id.
    fn get_request(&self, id: RequestId) -> Result<Option<PushRequest>>;

    /// Fetch a live request other than `exclude` already bound to
    /// `revision`, if any.
    ///
    /// Discarded requests never match. When several requests qualify,
    /// implementations return the one with the lowest id.
    fn get_request_by_revision(
        &self,
        revision: &Revision,
        exclude: RequestId,
    ) -> Result<Option<PushRequest>>;

    /// Apply `update` to a request, returning the new record.
    ///
    /// Returns `Ok(None)` if the request no longer exists.
    fn update_request(&self, id: RequestId, update: &RequestUpdate)
    -> Result<Option<PushRequest>>;

    /// The push a request belongs to, if any.
    fn get_push_for_request(&self, id: RequestId) -> Result<Option<PushId>>;

    /// All requests in a push, in insertion order.
    fn get_request_ids_in_push(&self, push: PushId) -> Result<Vec<RequestId>>;
}

impl<T: RequestStore + ?Sized> RequestStore for Arc<T> {
    fn get_request(&self, id: RequestId) -> Result<Option<PushRequest>> {
        (**self).get_request(id)
    }

    fn get_request_by_revision(
        &self,
        revision: &Revision,
        exclude: RequestId,
    ) -> Result<Option<PushRequest>> {
        (**self).get_request_by_revision(revision, exclude)
    }

    fn update_request(
        &self,
        id: RequestId,
        update: &RequestUpdate,
    ) -> Result<Option<PushRequest>> {
        (**self).update_request(id, update)
    }

    fn get_push_for_request(&self, id: RequestId) -> Result<Option<PushId>> {
        (**self).get_push_for_request(id)
    }

    fn get_request_ids_in_push(&self, push: PushId) -> Result<Vec<RequestId>> {
        (**self).get_request_ids_in_push(push)
    }
}

/// Tells the requester and watchers how a job went.
///
/// Delivery is best effort: implementations log their own failures and
/// never retry.
pub trait Notifier: Send + Sync {
    /// Report `outcome` for `request` (the record as last written).
    fn notify(&self, request: &PushRequest, outcome: &Outcome);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, request: &PushRequest, outcome: &Outcome) {
        (**self).notify(request, outcome);
    }
}
