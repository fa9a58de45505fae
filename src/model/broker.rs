use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Lifecycle of the broker (the event organizer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerState {
    OpeningTheEvent,
    AnnouncingNextRace,
    WaitingForBets,
    SupervisingTheRace,
    SettlingAccounts,
    PlayingHostAtTheBar,
}

impl Display for BrokerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BrokerState::OpeningTheEvent => "OPENING_THE_EVENT",
            BrokerState::AnnouncingNextRace => "ANNOUNCING_NEXT_RACE",
            BrokerState::WaitingForBets => "WAITING_FOR_BETS",
            BrokerState::SupervisingTheRace => "SUPERVISING_THE_RACE",
            BrokerState::SettlingAccounts => "SETTLING_ACCOUNTS",
            BrokerState::PlayingHostAtTheBar => "PLAYING_HOST_AT_THE_BAR",
        };
        write!(f, "{s}")
    }
}
