pub mod agent_client;
pub mod authorization;
pub mod ceremony;
pub mod credential_issuer;
pub mod metadata_resolver;
pub mod redirect_capture;
