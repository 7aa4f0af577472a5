pub mod bot;
pub mod handlers;
pub mod server;

pub use bot::{BotController, BotReport};
pub use server::{AdminState, build_admin_router, start_admin};
