//! `parley parse`: print the parser events for a reply.

use std::path::Path;

use anyhow::Result;
use parley_hml::{ParseEvent, TagParser};

use crate::theme::Theme;

/// Parse `input` in chunks of `chunk_size` characters and print every event.
pub(crate) fn run_parse(input: Option<&Path>, chunk_size: usize, json: bool) -> Result<()> {
    let text = super::read_input(input)?;
    let mut parser = TagParser::new();
    let mut events = Vec::new();
    for chunk in super::chunks(&text, chunk_size) {
        events.extend(parser.write(chunk));
    }
    events.extend(parser.end());

    for event in &events {
        if json {
            println!("{}", serde_json::to_string(event)?);
        } else {
            println!("{}", describe(event));
        }
    }

    if !json {
        let errors = events.iter().filter(|e| e.is_error()).count();
        println!("{}", Theme::separator());
        println!(
            "{}",
            Theme::dimmed(&format!("{} events, {errors} errors", events.len()))
        );
    }
    Ok(())
}

/// One-line, human-readable rendering of an event.
pub(crate) fn describe(event: &ParseEvent) -> String {
    match event {
        ParseEvent::Text { text } => Theme::dimmed(&format!("text      {text:?}")),
        ParseEvent::ElementStart { element } => {
            format!("start     <{}> {}", element.kind, Theme::dimmed(&element.id.to_string()))
        },
        ParseEvent::ElementUpdate { kind, delta, .. } => {
            format!("update    <{kind}> {delta:?}")
        },
        ParseEvent::ElementComplete { element } => Theme::success(&format!(
            "complete  <{}> {:?}",
            element.kind, element.content
        )),
        ParseEvent::ElementError { element, message } => match element {
            Some(element) => Theme::error(&format!("error     <{}> {message}", element.kind)),
            None => Theme::error(&format!("error     {message}")),
        },
        ParseEvent::Done { executables } => {
            Theme::info(&format!("done      {} executable(s)", executables.len()))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_events() {
        colored::control::set_override(false);
        let mut parser = TagParser::new();
        let mut events = parser.write("hi <bash>ls</bash></todo>");
        events.extend(parser.end());

        let lines: Vec<String> = events.iter().map(describe).collect();
        assert!(lines.iter().any(|l| l.contains("complete  <bash> \"ls\"")));
        assert!(lines.iter().any(|l| l.starts_with("✗ error")));
        assert!(lines.last().unwrap().contains("1 executable(s)"));
    }
}
