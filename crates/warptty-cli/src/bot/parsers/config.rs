//! The game configuration screen, read for the stardock location.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{LineParser, Outcome};

fn stardock_location() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"The StarDock is located in sector ([0-9]+)\.").expect("static pattern")
    })
}

/// Watches the configuration screen for the stardock sector. Some games hide
/// it, so the parser gives up quietly after a handful of lines.
#[derive(Default)]
pub struct ConfigParser {
    stardock: Option<u32>,
    misses: u32,
    done: bool,
}

impl ConfigParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineParser for ConfigParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        if let Some(caps) = stardock_location().captures(line) {
            match caps[1].parse() {
                Ok(sector) => {
                    self.stardock = Some(sector);
                    self.done = true;
                }
                Err(_) => warn!(line, "failed to parse stardock sector from game config"),
            }
            return;
        }
        self.misses += 1;
        if self.misses > 10 {
            self.done = true;
            warn!("did not see stardock setting in game config");
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        self.stardock.map(Outcome::Stardock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stardock_location() {
        let mut parser = Box::new(ConfigParser::new());
        parser.parse("Trade Wars 2002 Game Configuration and Status");
        parser.parse("");
        parser.parse("The StarDock is located in sector 1920.");
        assert!(parser.is_done());
        assert_eq!(parser.finish(), Some(Outcome::Stardock(1920)));
    }

    #[test]
    fn test_gives_up_after_enough_lines() {
        let mut parser = Box::new(ConfigParser::new());
        parser.parse("Trade Wars 2002 Game Configuration and Status");
        for _ in 0..9 {
            parser.parse("Turns per day      : 250");
            assert!(!parser.is_done());
        }
        parser.parse("Days since start   : 12");
        assert!(parser.is_done());
        assert!(parser.finish().is_none());
    }
}
