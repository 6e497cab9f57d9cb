pub mod ballots;
pub mod health;
