//! Google Calendar integration: token endpoint client, calendar API
//! gateway, and link-flow helpers.

pub mod gateway;
pub mod oauth;
pub mod token_client;

pub use gateway::GoogleCalendarGateway;
pub use token_client::GoogleTokenClient;
