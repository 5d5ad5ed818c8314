pub mod client;
pub mod error;
pub mod keyboard;
pub mod poller;
pub mod types;

pub use client::VkApiClient;
pub use error::VkError;
pub use keyboard::VkKeyboard;
pub use poller::LongPoller;
pub use types::{ChatUpdate, MemberProfile};
