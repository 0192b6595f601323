//! Bot error types with actionable hints.

use std::fmt;

/// Error codes for bot operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SectorNotCached,
    PlanetNotCached,
    UnsafeSector,
    ParseFailed,
    PortUnusable,
    ActionFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::SectorNotCached => write!(f, "SECTOR_NOT_CACHED"),
            ErrorCode::PlanetNotCached => write!(f, "PLANET_NOT_CACHED"),
            ErrorCode::UnsafeSector => write!(f, "UNSAFE_SECTOR"),
            ErrorCode::ParseFailed => write!(f, "PARSE_FAILED"),
            ErrorCode::PortUnusable => write!(f, "PORT_UNUSABLE"),
            ErrorCode::ActionFailed => write!(f, "ACTION_FAILED"),
        }
    }
}

/// An error from a bot operation, with context for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotError {
    pub code: ErrorCode,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for BotError {}

impl BotError {
    pub fn sector_not_cached(sector: u32) -> Self {
        Self {
            code: ErrorCode::SectorNotCached,
            message: format!("no cached data for sector {}", sector),
            hint: Some("holo-scan with 'sh' or visit the sector first".into()),
        }
    }

    pub fn current_sector_unknown() -> Self {
        Self {
            code: ErrorCode::SectorNotCached,
            message: "current sector is not known yet".into(),
            hint: Some("wait for a command prompt or run quick stats".into()),
        }
    }

    pub fn planet_not_cached(planet: u32) -> Self {
        Self {
            code: ErrorCode::PlanetNotCached,
            message: format!("no cached data for planet {}", planet),
            hint: Some("land on the planet so its display can be read".into()),
        }
    }

    pub fn unsafe_sector(sector: u32, reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::UnsafeSector,
            message: format!("sector {} is not safe: {}", sector, reason.into()),
            hint: None,
        }
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ParseFailed,
            message: message.into(),
            hint: None,
        }
    }

    pub fn port_unusable(sector: u32, reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::PortUnusable,
            message: format!("port in sector {} cannot be used: {}", sector, reason.into()),
            hint: None,
        }
    }

    pub fn action_failed(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ActionFailed,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
