use std::sync::Arc;

use crate::dashboard::SessionRegistry;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<SessionRegistry>,
}
