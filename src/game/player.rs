//! Player records and their visibility projections.

use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};

use crate::types::*;

/// Authoritative per-player record. Never sent as-is; see [`PlayerView`].
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub name: PlayerName,
    pub word: Option<String>,
    pub revealed_portion: String,
    pub guessed_letters: BTreeSet<char>,
    pub guessed_words: BTreeSet<String>,
    pub eliminated_players: BTreeSet<PlayerName>,
    pub state: PlayerState,
    /// Most recent first, capped at [`GUESS_HISTORY_CAP`]
    pub last_guessed_against: VecDeque<PlayerName>,
    pub last_guessed_by: VecDeque<PlayerName>,
}

impl Player {
    pub fn new(name: impl Into<PlayerName>) -> Self {
        Self {
            name: name.into(),
            word: None,
            revealed_portion: String::new(),
            guessed_letters: BTreeSet::new(),
            guessed_words: BTreeSet::new(),
            eliminated_players: BTreeSet::new(),
            state: PlayerState::Joined,
            last_guessed_against: VecDeque::new(),
            last_guessed_by: VecDeque::new(),
        }
    }

    pub fn word_len(&self) -> Option<usize> {
        self.word.as_ref().map(|w| w.chars().count())
    }

    pub fn set_word(&mut self, word: String) {
        self.revealed_portion = PLACEHOLDER.to_string().repeat(word.chars().count());
        self.word = Some(word);
        self.state = PlayerState::Joined;
    }

    pub fn clear_word(&mut self) {
        self.word = None;
        self.revealed_portion.clear();
        self.state = PlayerState::Joined;
    }

    /// Make the whole word public (elimination, disconnect)
    pub fn disclose(&mut self) {
        if let Some(word) = &self.word {
            self.revealed_portion = word.clone();
        }
    }

    pub fn is_fully_revealed(&self) -> bool {
        self.word.as_deref() == Some(self.revealed_portion.as_str())
    }

    pub fn record_guessed_against(&mut self, subject: &str) {
        push_capped(&mut self.last_guessed_against, subject);
    }

    pub fn record_guessed_by(&mut self, actor: &str) {
        push_capped(&mut self.last_guessed_by, actor);
    }

    /// Full view for the owning player
    pub fn own_view(&self) -> PlayerView {
        self.project(true)
    }

    /// View for everyone else: the word is withheld until it becomes public
    pub fn others_view(&self) -> PlayerView {
        self.project(self.state.discloses_word())
    }

    pub fn view_for(&self, viewer: Option<&str>) -> PlayerView {
        if viewer == Some(self.name.as_str()) {
            self.own_view()
        } else {
            self.others_view()
        }
    }

    fn project(&self, include_word: bool) -> PlayerView {
        PlayerView {
            name: self.name.clone(),
            word: if include_word { self.word.clone() } else { None },
            revealed_portion: self.revealed_portion.clone(),
            guessed_letters: self.guessed_letters.clone(),
            guessed_words: self.guessed_words.clone(),
            eliminated_players: self.eliminated_players.clone(),
            state: self.state,
            last_guessed_against: self.last_guessed_against.iter().cloned().collect(),
            last_guessed_by: self.last_guessed_by.iter().cloned().collect(),
        }
    }
}

fn push_capped(history: &mut VecDeque<PlayerName>, name: &str) {
    history.push_front(name.to_string());
    history.truncate(GUESS_HISTORY_CAP);
}

/// Serializable projection of a [`Player`]
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub name: PlayerName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    pub revealed_portion: String,
    pub guessed_letters: BTreeSet<char>,
    pub guessed_words: BTreeSet<String>,
    pub eliminated_players: BTreeSet<PlayerName>,
    pub state: PlayerState,
    pub last_guessed_against: Vec<PlayerName>,
    pub last_guessed_by: Vec<PlayerName>,
}

/// Reveal every position of `revealed` where `word` has `letter`
pub fn fill_in_chars(word: &str, revealed: &str, letter: char) -> String {
    word.chars()
        .zip(revealed.chars())
        .map(|(w, r)| if w == letter { w } else { r })
        .collect()
}
