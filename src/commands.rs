use log::{error, info};

use crate::queries::accounts::Registry;

pub const GREETING: &str = "👋 Hi! Use /add <leetcode_username> to link your account.\n\
                            Use /list to see all registered users.";
pub const ADD_USAGE: &str = "Usage: /add <leetcode_username>";
pub const REMOVED: &str = "❌ Your LeetCode username has been removed.";
pub const NOBODY_REGISTERED: &str = "No users registered yet.";
pub const STORE_FAILURE: &str = "⚠️ Something went wrong, please try again later.";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Add(Vec<String>),
    Remove,
    List,
}

impl Command {
    /// Parses a chat message. Anything that isn't one of our commands is `None`,
    /// including commands addressed to another bot as `/list@OtherBot`.
    pub fn parse(text: &str, bot_username: &str) -> Option<Command> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;
        let name = match head.split_once('@') {
            Some((name, target)) if target.eq_ignore_ascii_case(bot_username) => name,
            Some(_) => return None,
            None => head,
        };

        match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(Command::Start),
            "add" => Some(Command::Add(words.map(str::to_owned).collect())),
            "remove" => Some(Command::Remove),
            "list" => Some(Command::List),
            _ => None,
        }
    }
}

/// Runs a command for `owner_id` and returns the reply text.
pub async fn handle(registry: &Registry, owner_id: &str, command: Command) -> String {
    match command {
        Command::Start => GREETING.into(),
        Command::Add(args) => {
            let [name] = args.as_slice() else {
                return ADD_USAGE.into();
            };
            let name = name.trim();
            match registry.upsert(owner_id, name).await {
                Ok(()) => {
                    info!("[Commands] {owner_id} linked {name}");
                    format!("✅ Linked LeetCode username: {name}")
                }
                Err(err) => {
                    error!("[Commands] Linking {name} for {owner_id} failed with err {err}");
                    STORE_FAILURE.into()
                }
            }
        }
        Command::Remove => match registry.remove(owner_id).await {
            Ok(()) => {
                info!("[Commands] {owner_id} unlinked");
                REMOVED.into()
            }
            Err(err) => {
                error!("[Commands] Unlinking {owner_id} failed with err {err}");
                STORE_FAILURE.into()
            }
        },
        Command::List => match registry.list_registered().await {
            Ok(names) if names.is_empty() => NOBODY_REGISTERED.into(),
            Ok(names) => format!("📜 Registered LeetCode Users:\n{}", names.join("\n")),
            Err(err) => {
                error!("[Commands] Listing users failed with err {err}");
                STORE_FAILURE.into()
            }
        },
    }
}
