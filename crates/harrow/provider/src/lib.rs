mod client;
mod logs;
mod registry;

pub use self::client::BatchClient;
pub use self::logs::extract_result_line;
pub use self::registry::ActionRegistry;
