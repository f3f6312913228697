//! Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "jobs",
    aliases: &["j", "job", "list"],
    description: "Analysis jobs on the backend",
  },
  Command {
    name: "submit",
    aliases: &["s", "run", "analyze"],
    description: "Start a job from the loaded job file",
  },
  Command {
    name: "presets",
    aliases: &["p", "preset"],
    description: "Suggested subreddits and phrases",
  },
  Command {
    name: "clear-cache",
    aliases: &["cc", "clear"],
    description: "Delete the backend's scrape cache",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Refetch what the current view shows",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit painboard",
  },
];

/// Commands matching `input`, best match first.
///
/// Ranking: exact name, exact alias, name prefix, alias prefix, then
/// substring of name or alias. Empty input lists everything.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let needle = input.trim().to_lowercase();
  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &needle).map(|r| (r, cmd)))
    .collect();
  ranked.sort_by_key(|(r, _)| *r);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}

fn rank(cmd: &Command, needle: &str) -> Option<u8> {
  let alias = |test: &dyn Fn(&str) -> bool| cmd.aliases.iter().any(|a| test(a));
  if needle.is_empty() || cmd.name == needle {
    Some(0)
  } else if alias(&|a| a == needle) {
    Some(1)
  } else if cmd.name.starts_with(needle) {
    Some(2)
  } else if alias(&|a| a.starts_with(needle)) {
    Some(3)
  } else if cmd.name.contains(needle) || alias(&|a| a.contains(needle)) {
    Some(4)
  } else {
    None
  }
}
