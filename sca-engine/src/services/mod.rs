pub mod aggregator;
pub mod authorization;
pub mod binding;
pub mod challenge;
pub mod error;
pub mod metrics;
pub mod providers;
pub mod registry;
pub mod store;

pub use aggregator::{MultilevelAggregator, OperationEvent};
pub use authorization::{AuthContext, AuthorizationService, ValidationOutcome};
pub use binding::OperationBinding;
pub use challenge::ChallengeService;
pub use error::ScaError;
pub use metrics::{
    get_metrics, init_metrics, record_challenge_sent, record_operation_outcome, record_validation,
};
pub use providers::{
    ChallengeMessage, FcmSender, GatewaySmsSender, MockEmailSender, MockPushSender, MockSmsSender,
    ProviderError, ProviderResponse, ScaSender, SmtpSender, StaticTanSender,
};
pub use registry::{CredentialVerifier, MethodRegistry};
pub use store::EngineStore;
