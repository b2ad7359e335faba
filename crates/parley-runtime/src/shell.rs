//! Reading the commands out of `<bash>` content.

use parley_core::Resource;

/// Characters that end one command and start the next.
const SEPARATORS: [char; 4] = [';', '&', '|', '\n'];

/// Substitution and redirection. Their effects do not show in the command
/// words, so text using them is only ever checked as a whole.
const OPAQUE: [&str; 4] = ["`", "$(", "<", ">"];

/// What a `<bash>` element would run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// The resource reported and escalated for the element.
    pub resource: Resource,
    /// Every command the element runs. All of them must be allowed.
    pub commands: Vec<Resource>,
}

impl ShellCommand {
    /// Read `script`.
    ///
    /// A plain command is the command named by its first word. A list or
    /// pipeline is the trimmed text as a whole, with one entry in
    /// [`commands`](Self::commands) per command in it. Text with substitution
    /// or redirection is the trimmed text and nothing else. Returns `None`
    /// when no command is named.
    #[must_use]
    pub fn parse(script: &str) -> Option<Self> {
        let script = script.trim();
        if script.is_empty() {
            return None;
        }
        if OPAQUE.iter().any(|marker| script.contains(marker)) {
            let whole = Resource::command(script);
            return Some(Self {
                resource: whole.clone(),
                commands: vec![whole],
            });
        }

        let commands: Vec<Resource> = script
            .split(SEPARATORS)
            .filter_map(|segment| segment.split_whitespace().next())
            .map(Resource::command)
            .collect();
        if commands.is_empty() {
            return None;
        }
        let resource = if script.contains(SEPARATORS) {
            Resource::command(script)
        } else {
            commands.first()?.clone()
        };
        Some(Self { resource, commands })
    }

    /// Check if the element runs more than its reported resource.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        self.commands.len() != 1 || self.commands.first() != Some(&self.resource)
    }
}
