//! Helpers for turning client requests into queue operations

use crate::{Error, Result};
use std::net::IpAddr;

/// Derive the fairness owner of a request from the client address.
///
/// IPv4 addresses map to their big-endian integer value. For IPv6 the low
/// 32 bits are used, so an IPv4-mapped address yields the same owner as the
/// plain IPv4 address.
pub fn owner_from_addr(addr: IpAddr) -> u32 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4),
        IpAddr::V6(v6) => {
            let octets = v6.octets();
            u32::from_be_bytes([octets[12], octets[13], octets[14], octets[15]])
        }
    }
}

/// Where a queue item should be moved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveCommand {
    /// Directly after the playing item
    Top,
    /// One position towards the head
    Up,
    /// One position towards the tail
    Down,
    /// To the end of the queue
    Bottom,
    /// To an explicit index
    To(usize),
}

impl MoveCommand {
    /// Parse `top`, `up`, `down`, `bottom` or a decimal index.
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim() {
            "top" => Ok(Self::Top),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "bottom" => Ok(Self::Bottom),
            other => other
                .parse::<usize>()
                .map(Self::To)
                .map_err(|_| Error::InvalidInput(format!("invalid move instruction: {other:?}"))),
        }
    }

    /// Resolve the destination for an item currently at `index`.
    ///
    /// `None` means "the end of the queue". `Up` from index 0 has no valid
    /// destination and is reported as an error.
    pub fn target(self, index: usize) -> Result<Option<usize>> {
        match self {
            Self::Top => Ok(Some(1)),
            Self::Up => index
                .checked_sub(1)
                .map(Some)
                .ok_or_else(|| Error::InvalidInput("cannot move the head item up".to_string())),
            Self::Down => Ok(Some(index + 1)),
            Self::Bottom => Ok(None),
            Self::To(to) => Ok(Some(to)),
        }
    }
}
