//! Guess resolution and turn advancement.

use super::{fill_in_chars, Game, GameInfo, PlayerView};
use crate::error::{GameError, GameResult};
use crate::types::*;

/// Everything the router needs to fan out the result of a guess
#[derive(Debug, Clone, PartialEq)]
pub struct GuessOutcome {
    pub actor: PlayerName,
    pub subject: PlayerName,
    pub actor_own: PlayerView,
    pub actor_others: PlayerView,
    pub subject_own: PlayerView,
    pub subject_others: PlayerView,
    /// Narration of the guess
    pub stream_info: String,
    pub game_info: GameInfo,
    pub eliminated: bool,
    pub victor: Option<PlayerName>,
}

impl Game {
    /// `actor` guesses a letter or a whole word against `subject`
    pub fn guess(&mut self, actor: &str, subject: &str, raw_guess: &str) -> GameResult<GuessOutcome> {
        self.require_phase(RoomState::Running)?;
        if self.current_player.as_deref() != Some(actor) {
            return Err(GameError::NotYourTurn(
                self.current_player.clone().unwrap_or_default(),
            ));
        }

        let remaining = self.remaining_players();
        if !remaining.iter().any(|n| n == actor) {
            return Err(GameError::InvalidTarget(actor.to_string()));
        }
        if !remaining.iter().any(|n| n == subject) {
            return Err(GameError::InvalidTarget(subject.to_string()));
        }

        let history = &self.player(actor)?.last_guessed_against;
        let repeated = history.len() >= REPEAT_WINDOW
            && history.iter().take(REPEAT_WINDOW).all(|n| n == subject);
        if repeated && remaining.len() > REPEAT_RULE_MIN_REMAINING {
            return Err(GameError::RepeatedTargetBlocked(subject.to_string()));
        }

        let guess = raw_guess.trim().to_lowercase();
        if guess.is_empty() || !guess.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(GameError::InvalidGuess);
        }

        self.player_mut(actor)?.record_guessed_against(subject);
        let target = self.player_mut(subject)?;
        target.record_guessed_by(actor);

        let word = target.word.clone().unwrap_or_default();
        let mut chars = guess.chars();
        let mut stream_info = match (chars.next(), chars.next()) {
            (Some(letter), None) => {
                target.guessed_letters.insert(letter);
                target.revealed_portion = fill_in_chars(&word, &target.revealed_portion, letter);
                let hits = word.chars().filter(|&c| c == letter).count();
                if hits == 0 {
                    format!("{actor} guessed \"{letter}\" against {subject}: no match.")
                } else {
                    format!(
                        "{actor} guessed \"{letter}\" against {subject}: {hits} revealed."
                    )
                }
            }
            _ => {
                target.guessed_words.insert(guess.clone());
                if guess == word {
                    target.disclose();
                    format!("{actor} guessed {subject}'s word \"{guess}\"!")
                } else {
                    format!("{actor} guessed \"{guess}\" against {subject}: wrong word.")
                }
            }
        };

        let eliminated = target.is_fully_revealed();
        if eliminated {
            target.state = PlayerState::Eliminated;
            target.disclose();
            self.player_mut(actor)?
                .eliminated_players
                .insert(subject.to_string());
            stream_info.push_str(&format!(" {subject} has been eliminated."));
            tracing::info!(actor = %actor, subject = %subject, "player eliminated");
        }

        let victor = self.settle_if_over();
        match &victor {
            Some(victor) => stream_info.push_str(&format!(" {victor} wins!")),
            None => {
                self.current_player = if !eliminated && actor != subject {
                    Some(subject.to_string())
                } else {
                    self.next_in_turn_order(actor)
                };
            }
        }

        let actor_record = self.player(actor)?;
        let subject_record = self.player(subject)?;
        Ok(GuessOutcome {
            actor: actor.to_string(),
            subject: subject.to_string(),
            actor_own: actor_record.own_view(),
            actor_others: actor_record.others_view(),
            subject_own: subject_record.own_view(),
            subject_others: subject_record.others_view(),
            stream_info,
            game_info: self.info(),
            eliminated,
            victor,
        })
    }
}
