pub mod roster;
pub mod session;
pub mod word;

pub use roster::{Participant, Roster};
pub use session::{GameSession, Guess, Outcome, classify};
pub use word::WordProgress;
