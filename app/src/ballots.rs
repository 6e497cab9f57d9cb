//! In-memory ballot book
//!
//! Stakes are validated against the `vote` config namespace: the stake
//! window closes `vote.close_before` seconds ahead of the ballot's close time.

use chrono::{DateTime, Utc};
use kit::config::VoteConfig;
use kit::{AppError, FrameworkError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stake {
    pub user: String,
    pub option: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ballot {
    pub id: u64,
    pub title: String,
    pub options: Vec<String>,
    pub closes_at: DateTime<Utc>,
    pub closed: bool,
    pub stakes: Vec<Stake>,
}

impl Ballot {
    /// Total staked per option
    pub fn totals(&self) -> BTreeMap<String, u64> {
        let mut totals: BTreeMap<String, u64> =
            self.options.iter().map(|o| (o.clone(), 0)).collect();
        for stake in &self.stakes {
            *totals.entry(stake.option.clone()).or_default() += stake.amount;
        }
        totals
    }
}

pub struct BallotBook {
    config: VoteConfig,
    ballots: Mutex<BTreeMap<u64, Ballot>>,
}

impl BallotBook {
    pub fn new(config: VoteConfig) -> Self {
        Self {
            config,
            ballots: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &VoteConfig {
        &self.config
    }

    pub fn open(
        &self,
        title: impl Into<String>,
        options: Vec<String>,
        closes_at: DateTime<Utc>,
    ) -> Result<Ballot, FrameworkError> {
        if options.len() < 2 {
            return Err(AppError::unprocessable("A ballot needs at least two options").into());
        }
        let mut ballots = self.ballots.lock().unwrap_or_else(PoisonError::into_inner);
        let id = ballots.keys().next_back().map_or(1, |last| last + 1);
        let ballot = Ballot {
            id,
            title: title.into(),
            options,
            closes_at,
            closed: false,
            stakes: Vec::new(),
        };
        ballots.insert(id, ballot.clone());
        Ok(ballot)
    }

    pub fn get(&self, id: u64) -> Result<Ballot, FrameworkError> {
        self.ballots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Ballot {} not found", id)).into())
    }

    pub fn stake(&self, id: u64, stake: Stake, now: DateTime<Utc>) -> Result<Ballot, FrameworkError> {
        if !self.config.accepts_stake(stake.amount) {
            return Err(AppError::unprocessable(format!(
                "Stakes must be between {} and {} {}",
                self.config.min_stake, self.config.max_stake, self.config.currency
            ))
            .into());
        }

        let mut ballots = self.ballots.lock().unwrap_or_else(PoisonError::into_inner);
        let ballot = ballots
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Ballot {} not found", id)))?;
        if ballot.closed || !self.config.is_open(ballot.closes_at, now) {
            return Err(AppError::conflict("Staking is closed for this ballot").into());
        }
        if !ballot.options.contains(&stake.option) {
            return Err(AppError::unprocessable(format!("Unknown option '{}'", stake.option)).into());
        }
        ballot.stakes.push(stake);
        Ok(ballot.clone())
    }

    pub fn close(&self, id: u64) -> Result<Ballot, FrameworkError> {
        let mut ballots = self.ballots.lock().unwrap_or_else(PoisonError::into_inner);
        let ballot = ballots
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Ballot {} not found", id)))?;
        if ballot.closed {
            return Err(AppError::conflict("Ballot already closed").into());
        }
        ballot.closed = true;
        Ok(ballot.clone())
    }

    /// Undo a close whose settlement could not be sent
    pub fn reopen(&self, id: u64) {
        let mut ballots = self.ballots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ballot) = ballots.get_mut(&id) {
            ballot.closed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn book() -> BallotBook {
        BallotBook::new(VoteConfig {
            enabled: true,
            min_stake: 5,
            max_stake: 50,
            currency: "POINT".to_string(),
            close_before: 60,
        })
    }

    fn stake(option: &str, amount: u64) -> Stake {
        Stake {
            user: "user-1".to_string(),
            option: option.to_string(),
            amount,
        }
    }

    #[test]
    fn stakes_respect_limits_and_the_close_window() {
        let book = book();
        let now = Utc::now();
        let ballot = book
            .open("Mascot", vec!["fox".into(), "owl".into()], now + Duration::minutes(10))
            .unwrap();

        book.stake(ballot.id, stake("fox", 10), now).unwrap();
        book.stake(ballot.id, stake("fox", 5), now).unwrap();
        let updated = book.stake(ballot.id, stake("owl", 50), now).unwrap();
        assert_eq!(
            updated.totals(),
            BTreeMap::from([("fox".to_string(), 15), ("owl".to_string(), 50)])
        );

        let too_much = book.stake(ballot.id, stake("fox", 51), now).unwrap_err();
        assert_eq!(too_much.status_code(), 422);
        let unknown = book.stake(ballot.id, stake("cat", 10), now).unwrap_err();
        assert_eq!(unknown.status_code(), 422);

        let late = now + Duration::minutes(9) + Duration::seconds(30);
        assert_eq!(book.stake(ballot.id, stake("fox", 10), late).unwrap_err().status_code(), 409);
    }

    #[test]
    fn closing_is_final() {
        let book = book();
        let ballot = book
            .open("Colour", vec!["red".into(), "blue".into()], Utc::now() + Duration::hours(1))
            .unwrap();
        assert!(book.close(ballot.id).unwrap().closed);
        assert_eq!(book.close(ballot.id).unwrap_err().status_code(), 409);
        assert_eq!(
            book.stake(ballot.id, stake("red", 10), Utc::now()).unwrap_err().status_code(),
            409
        );
        assert_eq!(book.get(99).unwrap_err().status_code(), 404);
    }

    #[test]
    fn ballots_need_two_options() {
        let err = book().open("Solo", vec!["only".into()], Utc::now()).unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn reopen_undoes_a_close() {
        let book = book();
        let ballot = book
            .open("Mascot", vec!["fox".into(), "owl".into()], Utc::now() + Duration::minutes(10))
            .unwrap();
        book.close(ballot.id).unwrap();
        book.reopen(ballot.id);

        assert!(!book.get(ballot.id).unwrap().closed);
        assert!(book.close(ballot.id).unwrap().closed);
        book.reopen(404);
    }
}
