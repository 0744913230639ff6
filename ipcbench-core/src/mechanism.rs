//! Transport mechanism selector and process role.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One of the four interchangeable transfer mechanisms.
///
/// The numeric selector is the value passed on the command line of both role
/// processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// Anonymous pipe created by the producer and inherited by the consumer.
    AnonymousPipe = 0,
    /// Named pipe (fifo) at a well-known path.
    NamedPipe = 1,
    /// TCP stream with block/acknowledge flow control.
    Socket = 2,
    /// Shared-memory ring buffer coordinated by named semaphores.
    SharedMemory = 3,
}

impl Mechanism {
    /// All mechanisms in selector order.
    pub const ALL: [Mechanism; 4] = [
        Self::AnonymousPipe,
        Self::NamedPipe,
        Self::Socket,
        Self::SharedMemory,
    ];

    /// Parses a numeric selector.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMechanism`] for values outside `0..=3`.
    pub fn from_selector(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::AnonymousPipe),
            1 => Ok(Self::NamedPipe),
            2 => Ok(Self::Socket),
            3 => Ok(Self::SharedMemory),
            _ => Err(Error::InvalidMechanism { value }),
        }
    }

    /// Returns the numeric selector.
    #[must_use]
    pub const fn selector(&self) -> u8 {
        *self as u8
    }

    /// Returns a human readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AnonymousPipe => "anonymous pipe",
            Self::NamedPipe => "named pipe",
            Self::Socket => "socket",
            Self::SharedMemory => "shared memory",
        }
    }

    /// Returns true if the mechanism takes a mechanism-specific extra argument
    /// (port number or inherited descriptor).
    #[must_use]
    pub const fn takes_extra_argument(&self) -> bool {
        matches!(self, Self::AnonymousPipe | Self::Socket)
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Mechanism {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::from_selector(value)
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.parse::<i64>() {
            Ok(value) => Self::from_selector(value),
            Err(_) => match trimmed {
                "anonymous-pipe" | "pipe" => Ok(Self::AnonymousPipe),
                "named-pipe" | "fifo" => Ok(Self::NamedPipe),
                "socket" | "tcp" => Ok(Self::Socket),
                "shared-memory" | "shm" => Ok(Self::SharedMemory),
                _ => Err(Error::Unparsable {
                    what: "mechanism",
                    text: s.to_string(),
                }),
            },
        }
    }
}

/// Which side of a transfer a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Generates the stream and sends it.
    Producer,
    /// Receives the stream and reports the elapsed time.
    Consumer,
}

impl Role {
    /// Tag used in the session log.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Producer => "Producer",
            Self::Consumer => "Consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mechanism_from_selector() {
        for (i, mechanism) in Mechanism::ALL.iter().enumerate() {
            assert_eq!(Mechanism::from_selector(i as i64).unwrap(), *mechanism);
            assert_eq!(mechanism.selector() as usize, i);
        }
    }

    #[test]
    fn test_mechanism_rejects_out_of_range() {
        assert_eq!(
            Mechanism::from_selector(4),
            Err(Error::InvalidMechanism { value: 4 })
        );
        assert!(Mechanism::from_selector(-1).is_err());
        assert!(Mechanism::try_from(99).is_err());
    }

    #[test]
    fn test_mechanism_from_str() {
        assert_eq!("2".parse::<Mechanism>().unwrap(), Mechanism::Socket);
        assert_eq!(" 3 ".parse::<Mechanism>().unwrap(), Mechanism::SharedMemory);
        assert_eq!("fifo".parse::<Mechanism>().unwrap(), Mechanism::NamedPipe);
        assert_eq!(
            "carrier-pigeon".parse::<Mechanism>(),
            Err(Error::Unparsable {
                what: "mechanism",
                text: "carrier-pigeon".to_string()
            })
        );
    }

    #[test]
    fn test_mechanism_extra_argument() {
        assert!(Mechanism::AnonymousPipe.takes_extra_argument());
        assert!(Mechanism::Socket.takes_extra_argument());
        assert!(!Mechanism::NamedPipe.takes_extra_argument());
        assert!(!Mechanism::SharedMemory.takes_extra_argument());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Producer.to_string(), "Producer");
        assert_eq!(format!("[{}]", Role::Consumer), "[Consumer]");
    }
}
