use apsigner_broker::BrokerHandle;
use apsigner_keystore::Keystore;
use apsigner_lsig::LsigRegistry;
use apsigner_providers::ProviderRegistry;
use std::sync::Arc;

/// Everything an HTTP handler needs, shared across every connection. Cheap
/// to clone: every field is already an `Arc` or a handle over one.
#[derive(Clone)]
pub struct AppState {
    pub keystore: Arc<Keystore>,
    pub providers: Arc<ProviderRegistry>,
    pub lsig: Arc<LsigRegistry>,
    pub broker: BrokerHandle,
    pub allow_group_modification: bool,
    pub bearer_token: Arc<str>,
}
