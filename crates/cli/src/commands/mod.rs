pub mod approval;
pub mod chat;
pub mod config_cmd;
pub mod providers;
pub mod run;
pub mod runtime;
