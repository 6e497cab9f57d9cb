//! Capabilities bound by the base service provider

pub mod auth;
pub mod dispatcher;
pub mod http_client;

pub use auth::{bearer_token, Authenticator, Gate, JwtAuthenticator, PermissionGate, Principal};
pub use dispatcher::{
    DirectDispatcher, DispatchOutcome, DrainReport, MicroserviceDispatcher, ScheduledDispatcher,
    ServiceMessage,
};
pub use http_client::{ClientOptions, HttpClient, OutgoingRequest, OutgoingResponse, ReqwestClient};
