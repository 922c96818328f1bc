pub mod callback;
pub mod server_key;
pub mod token_check;
pub mod utils;
