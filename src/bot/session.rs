use crate::models::PlantId;

/// Where a user is inside a multi-step form. Absent when idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    AddName,
    AddInterval { name: String },
    AddType { name: String, interval_days: i32 },
    WaterPick,
    PhotoPick,
    AwaitingPhoto { plant_id: PlantId, plant_name: String },
    GroupName,
    AssignPlant,
    AssignGroup { plant_id: PlantId, plant_name: String },
}

/// Slash commands, optionally addressed as `/cmd@BotName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Menu,
    Help,
    Add,
    Water,
    Plants,
    History,
    Pending,
    Delete(String),
    Photo,
    Photos,
    NewGroup,
    Groups,
    Assign,
    Stats,
    Notifications,
    Cancel,
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (head, args) = match body.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();

        let command = match name.as_str() {
            "start" => Command::Start,
            "menu" => Command::Menu,
            "help" => Command::Help,
            "add" => Command::Add,
            "water" => Command::Water,
            "plants" => Command::Plants,
            "history" => Command::History,
            "pending" => Command::Pending,
            "delete" => Command::Delete(args.to_string()),
            "photo" => Command::Photo,
            "photos" => Command::Photos,
            "newgroup" => Command::NewGroup,
            "groups" => Command::Groups,
            "assign" => Command::Assign,
            "stats" => Command::Stats,
            "notifications" => Command::Notifications,
            "cancel" => Command::Cancel,
            _ => Command::Unknown(name),
        };
        Some(command)
    }
}
