//! Shared application state.

use axum::extract::FromRef;

use crate::auth::SharedResolver;
use crate::services::AdminService;

/// State handed to every handler: the service facade over the store and the
/// resolver that turns bearer tokens into identities.
pub struct AppState<S> {
    pub service: AdminService<S>,
    pub identity: SharedResolver,
}

impl<S> AppState<S> {
    pub fn new(service: AdminService<S>, identity: SharedResolver) -> Self {
        Self { service, identity }
    }
}

impl<S: Clone> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<S> FromRef<AppState<S>> for SharedResolver {
    fn from_ref(state: &AppState<S>) -> Self {
        state.identity.clone()
    }
}
