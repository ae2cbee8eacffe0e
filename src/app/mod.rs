//! Application layer: the RPC facade, the session service and shared state.

pub mod facade;
pub mod service;
pub mod state;

pub use facade::RpcFacade;
pub use service::AppService;
pub use state::AppState;
