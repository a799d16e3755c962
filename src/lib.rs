pub mod cli;
pub mod config;
pub mod database_ops;
pub mod dump;
pub mod pipeline;

pub mod util {
    pub mod env;
    pub mod logging;
}
