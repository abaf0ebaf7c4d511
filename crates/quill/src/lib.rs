pub mod agent;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod schema;
pub mod toolset;
