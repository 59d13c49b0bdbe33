//! Telegram command parsing.
//!
//! Turns raw message text into a [`Command`]. Date and time stay as raw
//! strings here; the pipeline validates them so every failure produces one
//! consistent user-facing message.

use turb_common::Product;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    About,
    /// Dated chart request.
    Chart {
        product: Product,
        date: String,
        time: String,
        region: String,
    },
    /// Newest-available charts; `None` means the default region.
    Latest { region: Option<String> },
    /// Recognized command with unusable arguments.
    Invalid { hint: String },
    /// Anything else, including plain text.
    Unknown,
}

/// One parsed message.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub command: Command,
    /// Whether the text addressed this bot by name. Group chats only
    /// answer mentioned messages.
    pub mentioned: bool,
}

/// Parse message text. Returns `None` for empty text and for commands
/// addressed to a different bot.
pub fn parse(text: &str, bot_username: Option<&str>) -> Option<ParsedCommand> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut mentioned = match bot_username {
        Some(username) => mentions(trimmed, username),
        None => false,
    };

    if !trimmed.starts_with('/') {
        return Some(ParsedCommand {
            command: Command::Unknown,
            mentioned,
        });
    }

    let mut tokens = trimmed.split_whitespace();
    let head = tokens.next().unwrap_or_default().trim_start_matches('/');
    let rest: Vec<&str> = tokens.collect();

    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if let Some(target) = target {
        match bot_username {
            // /latest@OtherBot is someone else's business.
            Some(username) if !target.eq_ignore_ascii_case(username) => return None,
            _ => mentioned = true,
        }
    }

    let command = match name.to_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "about" => Command::About,
        "latest" => Command::Latest {
            region: join_region(&rest),
        },
        "continent" => match join_region(&rest) {
            Some(region) => Command::Latest {
                region: Some(region),
            },
            None => Command::Invalid {
                hint: "Please provide a region name, e.g. /continent Asia".to_string(),
            },
        },
        // Any product name works here; /help only advertises the two
        // composite charts.
        other => match other.strip_suffix("_request").map(Product::from_name) {
            Some(Ok(product)) => chart_command(product, other, &rest),
            _ => Command::Unknown,
        },
    };

    Some(ParsedCommand { command, mentioned })
}

fn chart_command(product: Product, name: &str, args: &[&str]) -> Command {
    if args.len() < 3 {
        return Command::Invalid {
            hint: format!(
                "Please provide date, time, and region, e.g. /{} 2024-11-24 10:00 Europe",
                name
            ),
        };
    }
    Command::Chart {
        product,
        date: args[0].to_string(),
        time: args[1].to_string(),
        region: args[2..].join(" "),
    }
}

fn join_region(args: &[&str]) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    }
}

fn mentions(text: &str, username: &str) -> bool {
    text.to_lowercase().contains(&format!("@{}", username.to_lowercase()))
}

pub fn start_text(regions: &[&str]) -> String {
    format!(
        "Welcome! I chart turbulence and wind shear from the ERA5 reanalysis.\n\
         Reanalysis trails real time by a few days, so the newest charts lag today.\n\n{}",
        usage_text(regions)
    )
}

pub fn usage_text(regions: &[&str]) -> String {
    format!(
        "Commands:\n\
         /turbulence_request <date> <time> <region> - turbulence severity map\n\
         /windshear_request <date> <time> <region> - wind shear chart\n\
         /latest - newest available charts for Europe\n\
         /continent <region> - newest available charts for a region\n\
         /about - data source and method\n\
         /help - this message\n\n\
         Example: /turbulence_request 2024-11-24 10:00 Europe\n\
         Regions: {}",
        regions.join(", ")
    )
}

pub const ABOUT_TEXT: &str = "Charts are computed from the ERA5 reanalysis \
(Copernicus Climate Data Store). Wind components and geopotential at two \
pressure levels are combined into vertical, horizontal, and overall wind \
shear, and the overall shear is classified into turbulence severity. ERA5 is \
updated daily with a delay of about five days, so the newest charts lag real \
time.";
