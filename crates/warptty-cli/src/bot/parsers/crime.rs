//! Results of robbing and stealing.

use warptty_core::event::{CrimeOutcome, EventKind};

use super::{LineParser, Outcome};

/// Watches for the line that reveals how a rob or steal attempt ended.
///
/// The game prints the verdict on the same line that narrates the attempt:
/// `Success` means the take is aboard, `Suddenly` introduces the guards.
pub struct CrimeParser {
    kind: EventKind,
    trigger: &'static str,
    sector: u32,
    verdict: Option<String>,
    done: bool,
}

impl CrimeParser {
    /// Busted outcomes carry the sector so recovery knows where the ship
    /// was caught.
    pub fn rob(sector: u32) -> Self {
        Self {
            kind: EventKind::RobResult,
            trigger: "You connect to their control computer to siphon the funds out",
            sector,
            verdict: None,
            done: false,
        }
    }

    pub fn steal(sector: u32) -> Self {
        Self {
            kind: EventKind::StealResult,
            trigger: "You start your droids loading the cargo",
            sector,
            verdict: None,
            done: false,
        }
    }
}

impl LineParser for CrimeParser {
    fn parse(&mut self, line: &str) {
        if self.done {
            return;
        }
        let line = line.trim();
        if line.starts_with(self.trigger) {
            self.verdict = Some(line.to_string());
            self.done = true;
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self: Box<Self>) -> Option<Outcome> {
        let verdict = self.verdict?;
        let outcome = if verdict.contains("Success") {
            CrimeOutcome::Success
        } else if verdict.contains("Suddenly") {
            CrimeOutcome::Busted
        } else {
            return None;
        };
        let sector = match outcome {
            CrimeOutcome::Busted => Some(self.sector),
            _ => None,
        };
        Some(Outcome::Crime {
            kind: self.kind,
            outcome,
            sector,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rob_success() {
        let mut parser = Box::new(CrimeParser::rob(500));
        parser.parse("You connect to their control computer to siphon the funds out... Success!");
        assert!(parser.is_done());

        assert_eq!(
            parser.finish(),
            Some(Outcome::Crime {
                kind: EventKind::RobResult,
                outcome: CrimeOutcome::Success,
                sector: None,
            })
        );
    }

    #[test]
    fn test_steal_busted_carries_sector() {
        let mut parser = Box::new(CrimeParser::steal(1000));
        parser.parse(
            "You start your droids loading the cargo... Suddenly the dock workers catch them red handed!",
        );
        assert!(parser.is_done());

        assert_eq!(
            parser.finish(),
            Some(Outcome::Crime {
                kind: EventKind::StealResult,
                outcome: CrimeOutcome::Busted,
                sector: Some(1000),
            })
        );
    }

    #[test]
    fn test_steal_success_has_no_sector() {
        let mut parser = Box::new(CrimeParser::steal(1000));
        parser.parse("You start your droids loading the cargo... Success, they're aboard!");
        let Some(Outcome::Crime { sector, outcome, .. }) = parser.finish() else {
            panic!("expected a crime outcome");
        };
        assert_eq!(outcome, CrimeOutcome::Success);
        assert_eq!(sector, None);
    }

    #[test]
    fn test_unreadable_verdict_yields_nothing() {
        let mut parser = Box::new(CrimeParser::rob(500));
        parser.parse("You connect to their control computer to siphon the funds out...");
        assert!(parser.is_done());
        assert!(parser.finish().is_none());
    }
}
