/// Daemon control commands read from stdin, with alias and prefix matching

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Online,
  Offline,
  Sync,
  Status,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: Action,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "online",
    aliases: &["up", "connect"],
    description: "Report that connectivity is back",
    action: Action::Online,
  },
  Command {
    name: "offline",
    aliases: &["down", "disconnect"],
    description: "Report that connectivity was lost",
    action: Action::Offline,
  },
  Command {
    name: "sync",
    aliases: &["s", "flush", "drain"],
    description: "Replay pending changes now",
    action: Action::Sync,
  },
  Command {
    name: "status",
    aliases: &["st", "pending"],
    description: "Show connectivity and pending changes",
    action: Action::Status,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Stop the daemon",
    action: Action::Quit,
  },
];

/// Get suggestions for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve a line of input to an action.
///
/// Ambiguous prefixes (e.g. "o" for online/offline) resolve to nothing.
pub fn parse(input: &str) -> Option<Action> {
  let suggestions = get_suggestions(input);
  match suggestions.as_slice() {
    [] => None,
    [only] => Some(only.action),
    [first, second, ..] => {
      let input_lower = input.trim().to_lowercase();
      let exact = first.name == input_lower || first.aliases.contains(&input_lower.as_str());
      let unique = first.action != second.action && exact;
      unique.then_some(first.action)
    }
  }
}

pub fn help() -> String {
  COMMANDS
    .iter()
    .map(|cmd| {
      format!(
        "  {:<8} {} (aliases: {})",
        cmd.name,
        cmd.description,
        cmd.aliases.join(", ")
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}
