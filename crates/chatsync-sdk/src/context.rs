use std::sync::Arc;

use chatsync_realtime::RealtimeSource;
use chatsync_types::{ExternalUser, Site};

use crate::api::MessageApi;

/// Everything a channel needs from the host application: who is chatting,
/// on which site, and the two transports.
#[derive(Clone)]
pub struct SdkContext {
    pub site: Option<Site>,
    pub user: Option<ExternalUser>,
    pub source: Arc<dyn RealtimeSource>,
    pub api: Arc<dyn MessageApi>,
}

impl SdkContext {
    pub fn new(source: Arc<dyn RealtimeSource>, api: Arc<dyn MessageApi>) -> Self {
        Self {
            site: None,
            user: None,
            source,
            api,
        }
    }

    pub fn with_site(mut self, site: Site) -> Self {
        self.site = Some(site);
        self
    }

    pub fn with_user(mut self, user: ExternalUser) -> Self {
        self.user = Some(user);
        self
    }
}
