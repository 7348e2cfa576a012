//! Prefix command parsing.
//!
//! Messages are matched against the configured prefix (or a mention of the
//! bot) and resolved to a [`BotCommand`]. Parsing is pure so it can be tested
//! without a gateway connection.

use serenity::model::id::UserId;

/// Comandos que entiende el bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Join,
    /// `None` cuando no se escribió nada después de `play`
    Play(Option<String>),
    Pause,
    Resume,
    Skip,
    Queue,
    NowPlaying,
    Radio,
    StopRadio,
    Ping,
    About,
    // Administración
    Leave,
    Stop,
    Restart,
    Debug,
}

/// Total de comandos (sin contar alias), se muestra en `about`
pub const COMMAND_COUNT: usize = 16;

impl BotCommand {
    /// Resuelve nombre o alias (sin distinguir mayúsculas)
    fn from_name(name: &str, args: &str) -> Option<Self> {
        let command = match name.to_lowercase().as_str() {
            "help" => BotCommand::Help,
            "join" => BotCommand::Join,
            "play" => {
                let query = args.trim();
                BotCommand::Play((!query.is_empty()).then(|| query.to_string()))
            }
            "pause" => BotCommand::Pause,
            "resume" | "unpause" => BotCommand::Resume,
            "skip" | "s" => BotCommand::Skip,
            "queue" | "q" => BotCommand::Queue,
            "nowplaying" | "np" => BotCommand::NowPlaying,
            "radio" => BotCommand::Radio,
            "stopradio" => BotCommand::StopRadio,
            "ping" => BotCommand::Ping,
            "about" => BotCommand::About,
            "leave" | "disconnect" | "dc" => BotCommand::Leave,
            "stop" => BotCommand::Stop,
            "restart" | "r" | "rs" => BotCommand::Restart,
            "debug" => BotCommand::Debug,
            _ => return None,
        };
        Some(command)
    }

    /// Los comandos de administración requieren el rol configurado
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            BotCommand::Leave | BotCommand::Stop | BotCommand::Restart | BotCommand::Debug
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            BotCommand::Help => "help",
            BotCommand::Join => "join",
            BotCommand::Play(_) => "play",
            BotCommand::Pause => "pause",
            BotCommand::Resume => "resume",
            BotCommand::Skip => "skip",
            BotCommand::Queue => "queue",
            BotCommand::NowPlaying => "nowplaying",
            BotCommand::Radio => "radio",
            BotCommand::StopRadio => "stopradio",
            BotCommand::Ping => "ping",
            BotCommand::About => "about",
            BotCommand::Leave => "leave",
            BotCommand::Stop => "stop",
            BotCommand::Restart => "restart",
            BotCommand::Debug => "debug",
        }
    }
}

/// Un comando reconocido junto con el prefijo con el que se invocó
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: BotCommand,
    pub prefix: String,
}

/// Interpreta un mensaje. Devuelve `None` si no es un comando del bot.
pub fn parse(content: &str, prefix: &str, bot_id: UserId) -> Option<Invocation> {
    let content = content.trim_start();

    let (used_prefix, rest) = strip_mention(content, bot_id)
        .or_else(|| strip_prefix_ignore_case(content, prefix))?;

    let rest = rest.trim_start();
    let (name, args) = match rest.find(char::is_whitespace) {
        Some(split) => rest.split_at(split),
        None => (rest, ""),
    };

    if name.is_empty() {
        return None;
    }

    BotCommand::from_name(name, args).map(|command| Invocation {
        command,
        prefix: used_prefix,
    })
}

fn strip_prefix_ignore_case<'a>(content: &'a str, prefix: &str) -> Option<(String, &'a str)> {
    let head = content.get(..prefix.len())?;
    if head.to_lowercase() == prefix.to_lowercase() {
        Some((head.to_string(), &content[prefix.len()..]))
    } else {
        None
    }
}

fn strip_mention(content: &str, bot_id: UserId) -> Option<(String, &str)> {
    [format!("<@{}>", bot_id), format!("<@!{}>", bot_id)]
        .into_iter()
        .find_map(|mention| {
            content
                .strip_prefix(mention.as_str())
                .map(|rest| (format!("{} ", mention), rest))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BOT: UserId = UserId::new(1234);

    fn command(content: &str) -> Option<BotCommand> {
        parse(content, "..", BOT).map(|inv| inv.command)
    }

    #[test]
    fn test_parse_prefix_and_aliases() {
        assert_eq!(command("..join"), Some(BotCommand::Join));
        assert_eq!(command("..q"), Some(BotCommand::Queue));
        assert_eq!(command("..NP"), Some(BotCommand::NowPlaying));
        assert_eq!(command("..unpause"), Some(BotCommand::Resume));
        assert_eq!(command("..s"), Some(BotCommand::Skip));
        assert_eq!(command("..dc"), Some(BotCommand::Leave));
        assert_eq!(command("..rs"), Some(BotCommand::Restart));
    }

    #[test]
    fn test_parse_play_query() {
        assert_eq!(
            command("..play  lucid dreams "),
            Some(BotCommand::Play(Some("lucid dreams".to_string())))
        );
        assert_eq!(command("..play"), Some(BotCommand::Play(None)));
        assert_eq!(
            command("..play https://juicewrldapi.com/juicewrld/songs/25/"),
            Some(BotCommand::Play(Some(
                "https://juicewrldapi.com/juicewrld/songs/25/".to_string()
            )))
        );
    }

    #[test]
    fn test_parse_ignores_other_messages() {
        assert_eq!(command("hello there"), None);
        assert_eq!(command(".."), None);
        assert_eq!(command("..unknown"), None);
        assert_eq!(command(".play x"), None);
    }

    #[test]
    fn test_parse_mention_prefix() {
        let inv = parse("<@1234> radio", "..", BOT).unwrap();
        assert_eq!(inv.command, BotCommand::Radio);
        assert_eq!(inv.prefix, "<@1234> ");

        assert_eq!(
            parse("<@!1234>stopradio", "..", BOT).map(|i| i.command),
            Some(BotCommand::StopRadio)
        );
        assert_eq!(parse("<@999> radio", "..", BOT), None);
    }

    #[test]
    fn test_parse_prefix_is_case_insensitive() {
        assert_eq!(
            parse("WRLD!skip", "wrld!", BOT).map(|i| i.command),
            Some(BotCommand::Skip)
        );
    }

    #[test]
    fn test_admin_commands() {
        let admin: Vec<&str> = [
            BotCommand::Leave,
            BotCommand::Stop,
            BotCommand::Restart,
            BotCommand::Debug,
            BotCommand::Play(None),
            BotCommand::Radio,
        ]
        .iter()
        .filter(|c| c.requires_admin())
        .map(BotCommand::name)
        .collect();

        assert_eq!(admin, vec!["leave", "stop", "restart", "debug"]);
    }
}
