use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roster::{Participant, Roster};
use super::word::WordProgress;

/// Result of classifying one inbound chat message as a guess attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Guess {
    Word(String),
    Letter(char),
}

/// Anything longer than one character is a full-word attempt. So is a
/// single character once only one player is left standing: the last player
/// has to name the word, not fish for letters.
pub fn classify(text: &str, active_players: usize) -> Guess {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if active_players > 1 => Guess::Letter(c),
        _ => Guess::Word(trimmed.to_string()),
    }
}

/// What one processed guess did to the session, carrying everything the
/// reply text needs. Construction is the only mutation path, so a value of
/// this enum is also a faithful record of the transition taken.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The session is already terminal; nothing was mutated.
    AlreadyFinished,
    /// The sender does not hold the turn; nothing was mutated.
    NotYourTurn { current: String },
    /// Correct full-word guess: points, winner flag, terminal.
    Victory {
        winner: String,
        points: u32,
        answer: String,
    },
    /// Wrong word: guesser eliminated, rotation continues.
    WrongWord { eliminated: String, next: String },
    /// Wrong word and nobody left to continue: terminal, no winner.
    WrongWordGameOver { eliminated: String, answer: String },
    /// Letter opened at least one position; the guesser keeps the turn.
    LetterHit {
        player: String,
        letter: char,
        points: u32,
        masked: String,
    },
    /// Letter opened the last masked position: winner, terminal.
    LetterWin {
        winner: String,
        letter: char,
        points: u32,
        answer: String,
    },
    /// Letter absent or already tried; the turn moves on.
    LetterMiss {
        player: String,
        letter: char,
        next: String,
        masked: String,
    },
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Outcome::Victory { .. }
                | Outcome::WrongWordGameOver { .. }
                | Outcome::LetterWin { .. }
        )
    }

    /// Whether processing this outcome changed session state at all.
    pub fn mutated_state(&self) -> bool {
        !matches!(self, Outcome::AlreadyFinished | Outcome::NotYourTurn { .. })
    }

    /// Human-readable chat reply.
    pub fn text(&self) -> String {
        match self {
            Outcome::AlreadyFinished => "Игра уже завершена.".to_string(),
            Outcome::NotYourTurn { current } => {
                format!("Сейчас не ваш ход! Ходит {current}.")
            }
            Outcome::Victory {
                winner,
                points,
                answer,
            } => format!(
                "{winner} угадал слово «{answer}» и получает {points} очков!\n\
                 Игра завершена, победитель — {winner}!"
            ),
            Outcome::WrongWord { eliminated, next } => format!(
                "{eliminated} не угадал слово и выбывает из игры.\n\
                 Следующим ходит {next}."
            ),
            Outcome::WrongWordGameOver { eliminated, answer } => format!(
                "{eliminated} не угадал слово и выбывает из игры.\n\
                 Активных игроков не осталось. Игра завершена!\n\
                 Загаданное слово: «{answer}»."
            ),
            Outcome::LetterHit {
                player,
                letter,
                points,
                masked,
            } => format!(
                "Буква «{letter}» есть в слове! {player} получает {points} очков и ходит снова.\n\
                 Слово: {masked}"
            ),
            Outcome::LetterWin {
                winner,
                letter,
                points,
                answer,
            } => format!(
                "Буква «{letter}» есть в слове! {winner} получает {points} очков.\n\
                 Слово «{answer}» разгадано полностью — победитель {winner}!"
            ),
            Outcome::LetterMiss {
                player,
                letter,
                next,
                masked,
            } => format!(
                "Буквы «{letter}» нет в слове, либо она уже называлась. {player} пропускает ход.\n\
                 Слово: {masked}\n\
                 Следующим ходит {next}."
            ),
        }
    }
}

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

/// One running game, scoped to one chat. Created in the awaiting-guess state
/// and mutated only through [`GameSession::process_guess`] and
/// [`GameSession::finish_now`]; `finished_at` going `Some` is the single,
/// irreversible terminal transition.
#[derive(Debug, Serialize, Deserialize)]
pub struct GameSession {
    pub session_id: Uuid,
    pub chat_id: i64,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub required_player_count: usize,
    roster: Roster,
    current_turn: usize,
    word: WordProgress,
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
}

impl Clone for GameSession {
    fn clone(&self) -> Self {
        Self {
            session_id: self.session_id,
            chat_id: self.chat_id,
            question: self.question.clone(),
            created_at: self.created_at,
            finished_at: self.finished_at,
            required_player_count: self.required_player_count,
            roster: self.roster.clone(),
            current_turn: self.current_turn,
            word: self.word.clone(),
            rng: entropy_rng(),
        }
    }
}

impl GameSession {
    pub fn new(
        chat_id: i64,
        question: impl Into<String>,
        answer: impl Into<String>,
        roster: Roster,
        required_player_count: usize,
        mut rng: StdRng,
    ) -> Self {
        let first_turn = if roster.is_empty() {
            0
        } else {
            rng.gen_range(0..roster.len())
        };
        Self {
            session_id: Uuid::new_v4(),
            chat_id,
            question: question.into(),
            created_at: Utc::now(),
            finished_at: None,
            required_player_count,
            roster,
            current_turn: first_turn,
            word: WordProgress::new(answer),
            rng,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn current_participant(&self) -> &Participant {
        &self.roster[self.current_turn]
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn masked_word(&self) -> &str {
        self.word.masked()
    }

    /// Single entry point of the state machine: one inbound chat message
    /// from `sender_id`, one outcome. Pure and synchronous; persistence is
    /// the caller's concern.
    pub fn process_guess(&mut self, sender_id: i64, raw_text: &str) -> Outcome {
        if self.is_finished() {
            return Outcome::AlreadyFinished;
        }
        if self.current_participant().user_id != sender_id {
            return Outcome::NotYourTurn {
                current: self.current_participant().display_name.clone(),
            };
        }
        match classify(raw_text, self.roster.active_count()) {
            Guess::Word(candidate) => self.guess_word(&candidate),
            Guess::Letter(letter) => self.guess_letter(letter),
        }
    }

    fn guess_word(&mut self, candidate: &str) -> Outcome {
        if self.word.check_answer(candidate) {
            let points = self.roll_points();
            let player = &mut self.roster[self.current_turn];
            player.score += points;
            player.is_winner = true;
            let winner = player.display_name.clone();
            self.finish();
            return Outcome::Victory {
                winner,
                points,
                answer: self.word.answer().to_string(),
            };
        }

        let eliminated = self.current_participant().display_name.clone();
        self.roster.eliminate(self.current_turn);
        if self.roster.active_count() <= 1 {
            // Not enough players left to keep rotating.
            self.finish();
            Outcome::WrongWordGameOver {
                eliminated,
                answer: self.word.answer().to_string(),
            }
        } else {
            self.current_turn = self.roster.advance_turn(self.current_turn);
            Outcome::WrongWord {
                eliminated,
                next: self.current_participant().display_name.clone(),
            }
        }
    }

    fn guess_letter(&mut self, letter: char) -> Outcome {
        if self.word.reveal(letter) {
            let points = self.roll_points();
            let player = &mut self.roster[self.current_turn];
            player.score += points;
            let name = player.display_name.clone();
            if self.word.is_complete() {
                self.roster[self.current_turn].is_winner = true;
                self.finish();
                Outcome::LetterWin {
                    winner: name,
                    letter,
                    points,
                    answer: self.word.answer().to_string(),
                }
            } else {
                // A correct letter grants another turn.
                Outcome::LetterHit {
                    player: name,
                    letter,
                    points,
                    masked: self.word.masked().to_string(),
                }
            }
        } else {
            let player = self.current_participant().display_name.clone();
            self.current_turn = self.roster.advance_turn(self.current_turn);
            Outcome::LetterMiss {
                player,
                letter,
                next: self.current_participant().display_name.clone(),
                masked: self.word.masked().to_string(),
            }
        }
    }

    /// Forced termination ("Завершить игру"). Idempotent.
    pub fn finish_now(&mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Uniform pick from {10, 20, 30, 40, 50}.
    fn roll_points(&mut self) -> u32 {
        self.rng.gen_range(1..=5u32) * 10
    }

    /// Replace the stored copy of one participant, matched by user id.
    /// Partial-update path for the persistence gateway.
    pub fn update_participant(&mut self, updated: &Participant) -> bool {
        match self.roster.position_of(updated.user_id) {
            Some(idx) => {
                self.roster[idx] = updated.clone();
                true
            }
            None => false,
        }
    }

    /// After recovery the persisted turn index may point at an eliminated
    /// participant (or past the roster); fall back to the first active one.
    pub fn revalidate_turn(&mut self) {
        if self.current_turn >= self.roster.len()
            || self.roster[self.current_turn].eliminated
        {
            if let Some(first_active) = (0..self.roster.len()).find(|&i| !self.roster[i].eliminated)
            {
                self.current_turn = first_active;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINT_VALUES: [u32; 5] = [10, 20, 30, 40, 50];

    fn roster_of(names: &[&str]) -> Roster {
        Roster::new(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| Participant::new(i as i64 + 1, format!("@{name}")))
                .collect(),
        )
    }

    fn session(answer: &str, names: &[&str], seed: u64) -> GameSession {
        GameSession::new(
            1,
            "Вопрос для теста",
            answer,
            roster_of(names),
            names.len(),
            StdRng::seed_from_u64(seed),
        )
    }

    fn current_id(session: &GameSession) -> i64 {
        session.current_participant().user_id
    }

    #[test]
    fn classify_splits_letters_and_words() {
        assert_eq!(classify("а", 3), Guess::Letter('а'));
        assert_eq!(classify("  б ", 3), Guess::Letter('б'));
        assert_eq!(classify("кот", 3), Guess::Word("кот".to_string()));
        // With one active player a lone character is a word attempt.
        assert_eq!(classify("я", 1), Guess::Word("я".to_string()));
    }

    #[test]
    fn correct_letter_reveals_and_keeps_turn() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        let outcome = game.process_guess(player, "a");

        match outcome {
            Outcome::LetterHit {
                points, ref masked, ..
            } => {
                assert_eq!(masked, "*a*");
                assert!(POINT_VALUES.contains(&points));
            }
            other => panic!("expected LetterHit, got {other:?}"),
        }
        assert_eq!(current_id(&game), player);
        assert!(!game.is_finished());
        assert!(game.word.tried_letters().contains(&'a'));
    }

    #[test]
    fn correct_word_after_letter_wins() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        game.process_guess(player, "a");
        let score_before = game.current_participant().score;

        let outcome = game.process_guess(player, "cat");
        match outcome {
            Outcome::Victory { points, .. } => assert!(POINT_VALUES.contains(&points)),
            other => panic!("expected Victory, got {other:?}"),
        }
        assert!(game.is_finished());
        let winner = game.current_participant();
        assert!(winner.is_winner);
        assert!(winner.score > score_before);
    }

    #[test]
    fn wrong_word_eliminates_and_advances() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        let outcome = game.process_guess(player, "dog");

        assert!(matches!(outcome, Outcome::WrongWord { .. }));
        assert!(!game.is_finished());
        assert_eq!(game.roster().active_count(), 2);
        assert_ne!(current_id(&game), player);
        assert!(!game.current_participant().eliminated);
    }

    #[test]
    fn wrong_word_with_two_active_finishes_the_game() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let first = current_id(&game);
        game.process_guess(first, "dog");

        let second = current_id(&game);
        let outcome = game.process_guess(second, "rat");
        assert!(matches!(outcome, Outcome::WrongWordGameOver { .. }));
        assert!(game.is_finished());
        assert_eq!(game.roster().active_count(), 1);
        assert!(game.roster().iter().all(|p| !p.is_winner));
    }

    #[test]
    fn out_of_turn_guess_changes_nothing() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let holder = current_id(&game);
        let intruder = game
            .roster()
            .iter()
            .map(|p| p.user_id)
            .find(|&id| id != holder)
            .unwrap();

        let before = game.clone();
        let outcome = game.process_guess(intruder, "cat");

        match outcome {
            Outcome::NotYourTurn { ref current } => {
                assert_eq!(*current, before.current_participant().display_name);
            }
            other => panic!("expected NotYourTurn, got {other:?}"),
        }
        assert_eq!(game.roster(), before.roster());
        assert_eq!(game.masked_word(), before.masked_word());
        assert_eq!(current_id(&game), holder);
        assert!(!game.is_finished());
    }

    #[test]
    fn wrong_letter_advances_without_elimination() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        let outcome = game.process_guess(player, "z");

        assert!(matches!(outcome, Outcome::LetterMiss { .. }));
        assert_eq!(game.roster().active_count(), 3);
        assert_ne!(current_id(&game), player);
    }

    #[test]
    fn repeated_letter_counts_as_miss() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        game.process_guess(player, "a");
        let outcome = game.process_guess(player, "a");
        assert!(matches!(outcome, Outcome::LetterMiss { .. }));
        assert_ne!(current_id(&game), player);
    }

    #[test]
    fn completing_the_word_by_letters_wins() {
        let mut game = session("да", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        let first = game.process_guess(player, "д");
        assert!(matches!(first, Outcome::LetterHit { .. }));

        let outcome = game.process_guess(player, "а");
        match outcome {
            Outcome::LetterWin { ref answer, .. } => assert_eq!(answer, "да"),
            other => panic!("expected LetterWin, got {other:?}"),
        }
        assert!(game.is_finished());
        assert!(game.current_participant().is_winner);
    }

    #[test]
    fn finished_session_rejects_everything() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        game.process_guess(player, "cat");
        assert!(game.is_finished());
        let finished_at = game.finished_at;

        let before = game.clone();
        for text in ["a", "cat", "dog"] {
            for id in 1..=3 {
                assert_eq!(game.process_guess(id, text), Outcome::AlreadyFinished);
            }
        }
        assert_eq!(game.roster(), before.roster());
        assert_eq!(game.masked_word(), before.masked_word());
        assert_eq!(game.finished_at, finished_at);
    }

    #[test]
    fn finish_now_sets_timestamp_once() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        game.finish_now();
        let first = game.finished_at;
        assert!(first.is_some());
        game.finish_now();
        assert_eq!(game.finished_at, first);
    }

    #[test]
    fn points_are_always_multiples_of_ten_in_range() {
        for seed in 0..20 {
            let mut game = session("cat", &["anna", "boris", "vera"], seed);
            let player = current_id(&game);
            game.process_guess(player, "cat");
            let winner = game.roster().iter().find(|p| p.is_winner).unwrap();
            assert!(POINT_VALUES.contains(&winner.score));
        }
    }

    #[test]
    fn revalidate_turn_skips_eliminated_holder() {
        let mut game = session("cat", &["anna", "boris", "vera"], 7);
        let first = current_id(&game);
        game.process_guess(first, "dog");

        // Simulate a stale persisted index pointing at the eliminated player.
        let snapshot = serde_json::to_string(&game).unwrap();
        let mut restored: GameSession = serde_json::from_str(&snapshot).unwrap();
        restored.current_turn = restored.roster.position_of(first).unwrap();
        restored.revalidate_turn();
        assert!(!restored.current_participant().eliminated);
    }

    #[test]
    fn session_round_trips_through_serde() {
        let mut game = session("молоко", &["anna", "boris", "vera"], 7);
        let player = current_id(&game);
        game.process_guess(player, "о");

        let snapshot = serde_json::to_string(&game).unwrap();
        let restored: GameSession = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(restored.session_id, game.session_id);
        assert_eq!(restored.masked_word(), game.masked_word());
        assert_eq!(restored.roster(), game.roster());
        assert_eq!(current_id(&restored), player);
        assert!(restored.word.tried_letters().contains(&'о'));
    }
}
