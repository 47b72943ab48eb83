use crate::db::models::user_score::UserScore;
use crate::parsing::commands::{InvalidInput, LOSE_BUTTON, STATS_BUTTON, WIN_BUTTON};
use crate::telegram::types::{KeyboardButton, OutgoingMessage, ParseMode, ReplyKeyboardMarkup};

/// Reply text plus how it should be rendered, before it is addressed to a chat
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub markdown: bool,
    pub keyboard: bool,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
            keyboard: false,
        }
    }

    fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
            keyboard: false,
        }
    }

    fn with_keyboard(mut self) -> Self {
        self.keyboard = true;
        self
    }

    pub fn start() -> Self {
        Self::plain(
            "Sup, I'm tracking ur pts in dota.\n\
             Press buttons or write numbers (e.g.: +30, -20).\n\
             Use /setmmr <number> to set ur pts and /stats to see today's games.",
        )
        .with_keyboard()
    }

    pub fn button(delta: i64, score: i64) -> Self {
        match delta > 0 {
            true => Self::markdown(format!("So what? 📈 Ur pts: *{score}*")),
            false => Self::markdown(format!("As expected. 📉 Ur pts: *{score}*")),
        }
    }

    pub fn delta(delta: i64, score: i64) -> Self {
        let trend = if delta > 0 { "📈" } else { "📉" };
        Self::markdown(format!("Accepted ({delta}). {trend} Ur pts: *{score}*")).with_keyboard()
    }

    pub fn set(score: i64) -> Self {
        Self::markdown(format!("MMR set to *{score}*. Counters reset.")).with_keyboard()
    }

    pub fn stats(score: Option<&UserScore>) -> Self {
        match score {
            Some(s) => Self::markdown(format!(
                "📊 Ur pts: *{}*\nToday: {} W / {} L",
                s.current_score, s.wins_today, s.losses_today
            )),
            None => Self::plain("No games tracked yet. Press a button or send a number to start."),
        }
        .with_keyboard()
    }

    pub fn invalid(err: &InvalidInput) -> Self {
        Self::plain(format!(
            "Can't set that: {err}. Usage: /setmmr <number> (e.g.: /setmmr 4200)"
        ))
    }

    pub fn unrecognized() -> Self {
        Self::plain("I only understand buttons or numbers (e.g.: -30, +40).")
    }

    pub fn storage_failure() -> Self {
        Self::plain("Couldn't reach the score database, try again in a moment.")
    }

    pub fn into_message(self, chat_id: i64) -> OutgoingMessage {
        OutgoingMessage {
            chat_id,
            text: self.text,
            parse_mode: self.markdown.then_some(ParseMode::Markdown),
            reply_markup: self.keyboard.then(keyboard),
        }
    }
}

/// Win/lose on the first row, stats below
pub fn keyboard() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup {
        keyboard: vec![
            vec![WIN_BUTTON.into(), LOSE_BUTTON.into()],
            vec![KeyboardButton::from(STATS_BUTTON)],
        ],
        resize_keyboard: true,
    }
}
