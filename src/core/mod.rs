pub mod config;
pub mod keyring;
pub mod model_selector;
pub mod prompt_manager;
pub mod session;
pub mod state;
pub mod storage;
pub mod tool_manager;
