pub mod instance;
pub mod method;
pub mod operation;

pub use instance::{AuthorizationInstance, Challenge, InstanceStatus};
pub use method::{AuthenticationMethod, ChannelKind, NewMethod};
pub use operation::{
    AuthorizationOperation, NewOperation, OperationKind, OperationStatus, Verdict,
};
