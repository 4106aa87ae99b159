// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

macro_rules! request_ticket {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Returns the ticket after `self`, skipping zero on wraparound.
            pub const fn next(self) -> Self {
                match self.0.checked_add(1) {
                    Some(value) => Self(value),
                    None => Self(1),
                }
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

request_ticket!(LookupTicket);
request_ticket!(PredictionTicket);

#[cfg(test)]
mod tests {
    use super::{LookupTicket, PredictionTicket};

    #[test]
    fn next_is_monotonic_and_skips_zero() {
        assert_eq!(LookupTicket::new(4).next(), LookupTicket::new(5));
        assert_eq!(PredictionTicket::new(u64::MAX).next(), PredictionTicket::new(1));
    }

    #[test]
    fn display_uses_hash_prefix() {
        assert_eq!(LookupTicket::new(12).to_string(), "#12");
    }
}
