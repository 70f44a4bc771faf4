use std::sync::Arc;

use crate::identity::AuthService;
use crate::persist::Backend;

/// Shared service handles, built once at startup and passed to whatever
/// needs them. There is no ambient global connection.
#[derive(Clone)]
pub struct AppContext {
    pub persist: Arc<dyn Backend>,
    pub auth: Arc<dyn AuthService>,
}

impl AppContext {
    pub fn new(persist: Arc<dyn Backend>, auth: Arc<dyn AuthService>) -> Self {
        AppContext { persist, auth }
    }
}
