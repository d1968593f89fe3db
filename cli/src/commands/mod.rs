mod analyze;
mod helpers;
mod session;
mod show_config;

pub(crate) use analyze::{cmd_analyze, cmd_ingredient};
pub(crate) use session::cmd_session;
pub(crate) use show_config::cmd_config;
