//! # presence-agent
//!
//! Runs one presence client: signs in with the configured identity, drives a
//! [`LifecycleCoordinator`](presence_service::LifecycleCoordinator), and
//! serves the resulting online set.
//!
//! | Route              | Description                                      |
//! |--------------------|--------------------------------------------------|
//! | `GET /health`      | liveness and current lifecycle phase             |
//! | `GET /health/ready`| store reachability                               |
//! | `GET /online`      | current online users state (JSON)                |
//! | `GET /online/ws`   | WebSocket push of every online users state       |
//! | `PUT /session`     | sign in as `{ "id", "name"? }`                   |
//! | `DELETE /session`  | sign out                                         |

pub mod bootstrap;
pub mod server;

pub use bootstrap::{create_agent_state, run, shutdown_signal, sign_in_configured};
pub use server::{create_app, create_router, AgentState};
