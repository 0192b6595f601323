//! Classification of interactive game prompts.
//!
//! Prompts never arrive with a line terminator, so the scanner hands over
//! the partial line as soon as it sees a `?`. The first twelve characters
//! are enough to tell every prompt apart.

use std::sync::OnceLock;

use regex::Regex;

use crate::event::PromptKind;
use crate::models::Product;

/// A classified prompt, with whatever context the prompt text carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptHit {
    pub kind: PromptKind,
    /// Current sector, present on command prompts.
    pub sector: Option<u32>,
    /// Product under negotiation, present on buy/sell prompts.
    pub product: Option<Product>,
}

impl PromptHit {
    fn bare(kind: PromptKind) -> Self {
        Self {
            kind,
            sector: None,
            product: None,
        }
    }
}

fn prompt_sector() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([0-9]+)\] ").expect("static pattern"))
}

fn buy_sell() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"How many holds of ([ a-zA-Z]+) do you want to ([a-z]+) \[")
            .expect("static pattern")
    })
}

/// Classify a cleaned partial line ending in `?`.
///
/// Returns `None` for lines that merely contain a question mark, which is
/// common in open chat.
pub fn classify(clean: &str) -> Option<PromptHit> {
    if clean.len() < 12 {
        return None;
    }
    match &clean[..12] {
        "Command [TL=" => {
            let sector = prompt_sector()
                .captures(clean)
                .and_then(|c| c[1].parse().ok());
            Some(PromptHit {
                kind: PromptKind::Command,
                sector,
                product: None,
            })
        }
        "Planet comma" => Some(PromptHit::bare(PromptKind::Planet)),
        "Computer com" => Some(PromptHit::bare(PromptKind::Computer)),
        "Corporate co" => Some(PromptHit::bare(PromptKind::Corp)),
        "Citadel comm" => Some(PromptHit::bare(PromptKind::Citadel)),
        "<StarDock> W" => Some(PromptHit::bare(PromptKind::StarDock)),
        "<Shipyards> " => Some(PromptHit::bare(PromptKind::Shipyard)),
        "Stop in this" => Some(PromptHit::bare(PromptKind::StopInSector)),
        "Mined Sector" => Some(PromptHit::bare(PromptKind::MinedSector)),
        "How many hol" => {
            let caps = buy_sell().captures(clean)?;
            let product = Product::from_name(&caps[1]);
            let kind = match &caps[2] {
                "buy" => PromptKind::Buy,
                "sell" => PromptKind::Sell,
                _ => return None,
            };
            Some(PromptHit {
                kind,
                sector: None,
                product,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_prompt_carries_sector() {
        let hit = classify("Command [TL=00:00:00]:[442] (?=Help)? : ?");
        assert_eq!(
            hit,
            Some(PromptHit {
                kind: PromptKind::Command,
                sector: Some(442),
                product: None,
            })
        );
    }

    #[test]
    fn test_simple_prompts() {
        let cases = [
            ("Planet command (?=Help)? :?", PromptKind::Planet),
            ("Computer command [TL=00:00:00]:[442] (?=Help)? ?", PromptKind::Computer),
            ("Corporate command [TL=00:00:00]:[442] (?=Help)? ?", PromptKind::Corp),
            ("Citadel command (?=Help) (Q=Leave) ?", PromptKind::Citadel),
            ("<StarDock> What would you like to do? ?", PromptKind::StarDock),
            ("<Shipyards> Which ship would you like? ?", PromptKind::Shipyard),
            ("Stop in this sector (Y,N,E,I,R,S,D)? ?", PromptKind::StopInSector),
            ("Mined Sector  Do you wish to continue? ?", PromptKind::MinedSector),
        ];
        for (line, kind) in cases {
            let hit = classify(line);
            assert_eq!(hit.map(|h| h.kind), Some(kind), "line: {}", line);
        }
    }

    #[test]
    fn test_buy_and_sell_prompts() {
        let hit = classify("How many holds of Equipment do you want to buy [20]?");
        assert_eq!(
            hit,
            Some(PromptHit {
                kind: PromptKind::Buy,
                sector: None,
                product: Some(Product::Equ),
            })
        );

        let hit = classify("How many holds of Fuel Ore do you want to sell [20]?");
        assert_eq!(
            hit,
            Some(PromptHit {
                kind: PromptKind::Sell,
                sector: None,
                product: Some(Product::Fuel),
            })
        );
    }

    #[test]
    fn test_chat_noise_is_not_a_prompt() {
        assert_eq!(classify("anyone want to trade?"), None);
        assert_eq!(classify("short?"), None);
    }
}
