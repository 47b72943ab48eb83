use thiserror::Error;

pub const WIN_BUTTON: &str = "✅ WIN (+25)";
pub const LOSE_BUTTON: &str = "❌ LOSE (-25)";
pub const STATS_BUTTON: &str = "📊 Stats";

pub const BUTTON_DELTA: i64 = 25;

/// What a single chat message asks the bot to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Stats,
    /// Win/lose buttons, kept apart from typed numbers since they get their own replies
    Button(i64),
    Delta(i64),
    SetAbsolute(i64),
    Invalid(InvalidInput),
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("missing value")]
    MissingValue,

    #[error("'{0}' is not a whole number")]
    NotANumber(String),

    #[error("'{0}' is out of range")]
    OutOfRange(String),
}

impl BotCommand {
    /// Classifies message text. `bot_username` lets `/start@name` style commands through when
    /// they are addressed to us, and drops them when addressed to another bot.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Self {
        let text = text.trim();

        match text {
            WIN_BUTTON => return Self::Button(BUTTON_DELTA),
            LOSE_BUTTON => return Self::Button(-BUTTON_DELTA),
            STATS_BUTTON => return Self::Stats,
            _ => (),
        }

        if let Some(rest) = text.strip_prefix('/') {
            let (head, arg) = match rest.split_once(char::is_whitespace) {
                Some((head, arg)) => (head, arg.trim()),
                None => (rest, ""),
            };

            let name = match head.split_once('@') {
                Some((name, target)) => match bot_username {
                    Some(ours) if ours.eq_ignore_ascii_case(target) => name,
                    _ => return Self::Unrecognized,
                },
                None => head,
            };

            return match name.to_ascii_lowercase().as_str() {
                "start" => Self::Start,
                "stats" => Self::Stats,
                "setmmr" => match parse_value(arg) {
                    Ok(value) => Self::SetAbsolute(value),
                    Err(e) => Self::Invalid(e),
                },
                _ => Self::Unrecognized,
            };
        }

        match parse_value(&text.replace(' ', "")) {
            Ok(delta) => Self::Delta(delta),
            Err(_) => Self::Unrecognized,
        }
    }
}

/// Parses a signed whole number that fits in `i32`. The store works in `i64`, so bounding input
/// here keeps every sum a user can build up far away from overflow.
pub fn parse_value(input: &str) -> Result<i64, InvalidInput> {
    if input.is_empty() {
        return Err(InvalidInput::MissingValue);
    }

    let body = input.strip_prefix(['+', '-']).unwrap_or(input);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return Err(InvalidInput::NotANumber(input.to_string()));
    }

    // only digits past this point, so a failed parse means the value is too large
    input
        .strip_prefix('+')
        .unwrap_or(input)
        .parse::<i32>()
        .map(i64::from)
        .map_err(|_| InvalidInput::OutOfRange(input.to_string()))
}
