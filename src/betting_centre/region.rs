use std::collections::BTreeMap;

use super::ops::*;
use super::policy::BetPolicy;
use crate::framework::{Outcome, RegionFault, SharedRegion, Wakeups};
use crate::model::{
    Bet, BetStatus, BrokerState, Caller, HorseIdx, ProtocolError, RaceId, SpectatorContext,
    SpectatorId, SpectatorState,
};
use crate::repository::{LogRecord, SharedLog};

/// Where a race's book stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The broker has not opened the window yet.
    Idle,
    Open,
    /// Every spectator has bet; winners not known yet.
    Closed,
    Settled,
}

#[derive(Debug)]
struct Book {
    phase: Phase,
    odds: Vec<f64>,
    bets: BTreeMap<SpectatorId, Bet>,
    /// Bets sent before the window opened.
    queued: BTreeMap<SpectatorId, SpectatorContext>,
    /// Spectators waiting for settlement to collect.
    collectors: BTreeMap<SpectatorId, SpectatorContext>,
    broker_waiting: bool,
}

impl Book {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            odds: Vec::new(),
            bets: BTreeMap::new(),
            queued: BTreeMap::new(),
            collectors: BTreeMap::new(),
            broker_waiting: false,
        }
    }
}

/// The betting centre: one book per race.
pub struct BettingCentre {
    spectators: usize,
    horses_per_race: u32,
    books: Vec<Book>,
    policy: Box<dyn BetPolicy>,
}

impl BettingCentre {
    pub fn new(
        races: u32,
        horses_per_race: u32,
        spectators: u32,
        policy: Box<dyn BetPolicy>,
    ) -> Self {
        Self {
            spectators: spectators as usize,
            horses_per_race,
            books: (0..races).map(|_| Book::new()).collect(),
            policy,
        }
    }

    pub fn phase(&self, race: RaceId) -> Option<Phase> {
        self.books.get(race as usize).map(|b| b.phase)
    }

    fn accept_the_bets(
        &mut self,
        race: RaceId,
        odds: Vec<f64>,
        log: &SharedLog,
        wakeups: &mut Wakeups<BettingReply>,
    ) -> Result<Outcome<BettingReply>, RegionFault> {
        if race > 0 && self.books[race as usize - 1].phase != Phase::Settled {
            return Err(ProtocolError::OutOfSequence(format!(
                "race {} is not settled yet",
                race - 1
            ))
            .into());
        }
        if self.books[race as usize].phase != Phase::Idle {
            return Err(ProtocolError::OutOfSequence(format!(
                "bets for race {race} were already opened"
            ))
            .into());
        }

        log.append(LogRecord::broker(BrokerState::WaitingForBets, Some(race)));
        let book = &mut self.books[race as usize];
        book.phase = Phase::Open;
        book.odds = odds;

        for (id, spectator) in std::mem::take(&mut book.queued) {
            let caller = Caller::spectator(id);
            match place(book, race, &spectator, self.horses_per_race, &*self.policy, log) {
                Ok(placed) => wakeups.wake(PLACE_A_BET, caller, placed),
                Err(e) => wakeups.reject(PLACE_A_BET, caller, e),
            }
        }

        if book.bets.len() == self.spectators {
            book.phase = Phase::Closed;
            Ok(Outcome::Done(BettingReply::BetsClosed {
                bets: book.bets.len() as u32,
            }))
        } else {
            book.broker_waiting = true;
            Ok(Outcome::Wait)
        }
    }

    fn place_a_bet(
        &mut self,
        race: RaceId,
        spectator: SpectatorContext,
        log: &SharedLog,
        wakeups: &mut Wakeups<BettingReply>,
    ) -> Result<Outcome<BettingReply>, RegionFault> {
        let book = &mut self.books[race as usize];
        match book.phase {
            Phase::Idle => {
                if book.queued.contains_key(&spectator.id) {
                    return Err(ProtocolError::DuplicateBet {
                        spectator: spectator.id,
                        race,
                    }
                    .into());
                }
                book.queued.insert(spectator.id, spectator);
                Ok(Outcome::Wait)
            }
            Phase::Open => {
                let placed = place(book, race, &spectator, self.horses_per_race, &*self.policy, log)?;
                if book.bets.len() == self.spectators {
                    book.phase = Phase::Closed;
                    if book.broker_waiting {
                        book.broker_waiting = false;
                        wakeups.wake(
                            ACCEPT_THE_BETS,
                            Caller::broker(),
                            BettingReply::BetsClosed {
                                bets: book.bets.len() as u32,
                            },
                        );
                    }
                }
                Ok(Outcome::Done(placed))
            }
            Phase::Closed | Phase::Settled => Err(ProtocolError::BettingClosed { race }.into()),
        }
    }

    fn are_there_any_winners(
        &mut self,
        race: RaceId,
        winners: Vec<HorseIdx>,
        log: &SharedLog,
        wakeups: &mut Wakeups<BettingReply>,
    ) -> Result<Outcome<BettingReply>, RegionFault> {
        let book = &mut self.books[race as usize];
        if book.phase != Phase::Closed {
            return Err(ProtocolError::OutOfSequence(format!(
                "race {race} cannot be settled while {:?}",
                book.phase
            ))
            .into());
        }

        log.append(LogRecord::broker(BrokerState::SettlingAccounts, Some(race)));
        for bet in book.bets.values_mut() {
            bet.settle(&winners);
        }
        book.phase = Phase::Settled;
        let any = book.bets.values().any(|b| b.status == BetStatus::Accepted);

        for (id, spectator) in std::mem::take(&mut book.collectors) {
            let gains = collect(book, race, &spectator, log)?;
            wakeups.wake(GO_COLLECT_THE_GAINS, Caller::spectator(id), gains);
        }
        Ok(Outcome::Done(BettingReply::Winners { any }))
    }

    fn go_collect_the_gains(
        &mut self,
        race: RaceId,
        spectator: SpectatorContext,
        log: &SharedLog,
    ) -> Result<Outcome<BettingReply>, RegionFault> {
        let book = &mut self.books[race as usize];
        match book.phase {
            Phase::Idle | Phase::Open => Err(ProtocolError::SettlementNotOpen { race }.into()),
            Phase::Closed => {
                book.collectors.insert(spectator.id, spectator);
                Ok(Outcome::Wait)
            }
            Phase::Settled => Ok(Outcome::Done(collect(book, race, &spectator, log)?)),
        }
    }
}

/// Checks and records one bet. Nothing changes if the bet is refused.
fn place(
    book: &mut Book,
    race: RaceId,
    spectator: &SpectatorContext,
    horses_per_race: u32,
    policy: &dyn BetPolicy,
    log: &SharedLog,
) -> Result<BettingReply, ProtocolError> {
    if book.bets.contains_key(&spectator.id) {
        return Err(ProtocolError::DuplicateBet {
            spectator: spectator.id,
            race,
        });
    }
    let (horse_idx, stake) = policy.choose(spectator, &book.odds);
    if horse_idx >= horses_per_race {
        return Err(ProtocolError::HorseIndexOutOfRange { idx: horse_idx });
    }
    let wallet = spectator
        .wallet
        .checked_sub(stake)
        .ok_or(ProtocolError::InsufficientFunds {
            stake,
            wallet: spectator.wallet,
        })?;

    book.bets.insert(
        spectator.id,
        Bet::new(race, spectator.id, horse_idx, stake),
    );
    log.append(
        LogRecord::spectator(spectator.id, SpectatorState::PlacingABet, Some(race))
            .with_payload(wallet),
    );
    Ok(BettingReply::BetPlaced {
        horse_idx,
        stake,
        wallet,
    })
}

/// `floor(stake × odds)`, with products that sit within rounding error of a whole
/// number counted as that number. `27 × 13/3` pays 117, not 116.
pub fn payout(stake: u64, odds: f64) -> u64 {
    let gross = stake as f64 * odds;
    let nearest = gross.round();
    if (gross - nearest).abs() <= PAYOUT_TOLERANCE * nearest.max(1.0) {
        nearest as u64
    } else {
        gross.floor() as u64
    }
}

const PAYOUT_TOLERANCE: f64 = 1e-9;

/// Pays an accepted bet once, see [`payout`]. Anything else pays nothing.
fn collect(
    book: &mut Book,
    race: RaceId,
    spectator: &SpectatorContext,
    log: &SharedLog,
) -> Result<BettingReply, RegionFault> {
    let amount = match book.bets.get_mut(&spectator.id) {
        Some(bet) if bet.status == BetStatus::Accepted && !bet.collected => {
            bet.collected = true;
            let odds = book.odds.get(bet.horse_idx as usize).ok_or_else(|| {
                RegionFault::Invariant(format!("no odds for horse {} in race {race}", bet.horse_idx))
            })?;
            payout(bet.stake, *odds)
        }
        Some(bet) => {
            bet.collected = true;
            0
        }
        None => 0,
    };
    let wallet = spectator.wallet.saturating_add(amount);
    log.append(
        LogRecord::spectator(spectator.id, SpectatorState::CollectingTheGains, Some(race))
            .with_payload(amount),
    );
    Ok(BettingReply::Gains { amount, wallet })
}

impl SharedRegion for BettingCentre {
    type Op = BettingOp;
    type Reply = BettingReply;
    type Context = SharedLog;

    fn handle(
        &mut self,
        _caller: Caller,
        op: BettingOp,
        log: &SharedLog,
        wakeups: &mut Wakeups<BettingReply>,
    ) -> Result<Outcome<BettingReply>, RegionFault> {
        match op {
            BettingOp::AcceptTheBets { race, odds } => self.accept_the_bets(race, odds, log, wakeups),
            BettingOp::PlaceABet { race, spectator } => {
                self.place_a_bet(race, spectator, log, wakeups)
            }
            BettingOp::AreThereAnyWinners { race, winners } => {
                self.are_there_any_winners(race, winners, log, wakeups)
            }
            BettingOp::HonourTheBets { race } => match self.books[race as usize].phase {
                Phase::Settled => Ok(Outcome::Done(BettingReply::Honoured)),
                _ => Err(ProtocolError::OutOfSequence(format!(
                    "bets of race {race} are not settled"
                ))
                .into()),
            },
            BettingOp::GoCollectTheGains { race, spectator } => {
                self.go_collect_the_gains(race, spectator, log)
            }
        }
    }
}
