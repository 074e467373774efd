//! IEC 61162-450 transmission groups.
//!
//! Each group is a fixed multicast address/port pair. The table is a
//! compile-time constant indexed by the group's ordinal:
//!
//! ```text
//! MISC  239.192.0.1:60001     USR1  239.192.0.9:60009
//! TGTD  239.192.0.2:60002     USR2  239.192.0.10:60010
//! SATD  239.192.0.3:60003     USR3  239.192.0.11:60011
//! NAVD  239.192.0.4:60004     USR4  239.192.0.12:60012
//! VDRD  239.192.0.5:60005     USR5  239.192.0.13:60013
//! RCOM  239.192.0.6:60006     USR6  239.192.0.14:60014
//! TIME  239.192.0.7:60007     USR7  239.192.0.15:60015
//! PROP  239.192.0.8:60008     USR8  239.192.0.16:60016
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// Number of standard transmission groups.
pub const GROUP_COUNT: usize = 16;

/// A transmission group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransmissionGroup {
    /// Sentences not explicitly listed elsewhere.
    Misc = 0,
    /// Target data (AIS), tracked target messages (radar).
    Tgtd = 1,
    /// High update rate data, e.g. heading and attitude.
    Satd = 2,
    /// Navigational output other than TGTD and SATD.
    Navd = 3,
    /// Data required for the VDR according to IEC 61996.
    Vdrd = 4,
    /// Radio communication equipment.
    Rcom = 5,
    /// Time transmitting equipment.
    Time = 6,
    /// Proprietary and user specified sentences.
    Prop = 7,
    /// User defined group 1.
    Usr1 = 8,
    /// User defined group 2.
    Usr2 = 9,
    /// User defined group 3.
    Usr3 = 10,
    /// User defined group 4.
    Usr4 = 11,
    /// User defined group 5.
    Usr5 = 12,
    /// User defined group 6.
    Usr6 = 13,
    /// User defined group 7.
    Usr7 = 14,
    /// User defined group 8.
    Usr8 = 15,
}

static GROUPS: [TransmissionGroup; GROUP_COUNT] = [
    TransmissionGroup::Misc,
    TransmissionGroup::Tgtd,
    TransmissionGroup::Satd,
    TransmissionGroup::Navd,
    TransmissionGroup::Vdrd,
    TransmissionGroup::Rcom,
    TransmissionGroup::Time,
    TransmissionGroup::Prop,
    TransmissionGroup::Usr1,
    TransmissionGroup::Usr2,
    TransmissionGroup::Usr3,
    TransmissionGroup::Usr4,
    TransmissionGroup::Usr5,
    TransmissionGroup::Usr6,
    TransmissionGroup::Usr7,
    TransmissionGroup::Usr8,
];

const NAMES: [&str; GROUP_COUNT] = [
    "MISC", "TGTD", "SATD", "NAVD", "VDRD", "RCOM", "TIME", "PROP", "USR1", "USR2", "USR3",
    "USR4", "USR5", "USR6", "USR7", "USR8",
];

/// Address/port table, indexed by group ordinal.
const REGISTRY: [(Ipv4Addr, u16); GROUP_COUNT] = build_registry();

const fn build_registry() -> [(Ipv4Addr, u16); GROUP_COUNT] {
    let mut table = [(Ipv4Addr::UNSPECIFIED, 0u16); GROUP_COUNT];
    let mut i = 0;
    while i < GROUP_COUNT {
        table[i] = (Ipv4Addr::new(239, 192, 0, i as u8 + 1), 60001 + i as u16);
        i += 1;
    }
    table
}

impl TransmissionGroup {
    /// All groups in ordinal order.
    pub fn all() -> &'static [TransmissionGroup; GROUP_COUNT] {
        &GROUPS
    }

    /// Create a group from its ordinal.
    pub fn from_u8(value: u8) -> Option<Self> {
        GROUPS.get(value as usize).copied()
    }

    /// Ordinal of this group.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Resolve the group to its multicast address and port.
    pub fn resolve(self) -> (Ipv4Addr, u16) {
        REGISTRY[self.index()]
    }

    /// Multicast address of this group.
    pub fn address(self) -> Ipv4Addr {
        self.resolve().0
    }

    /// UDP port of this group.
    pub fn port(self) -> u16 {
        self.resolve().1
    }

    /// Multicast socket address of this group.
    pub fn socket_addr(self) -> SocketAddrV4 {
        let (addr, port) = self.resolve();
        SocketAddrV4::new(addr, port)
    }

    /// Four-letter group name as used in IEC 61162-450.
    pub fn name(self) -> &'static str {
        NAMES[self.index()]
    }
}

impl std::fmt::Display for TransmissionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGroup(pub String);

impl std::fmt::Display for UnknownGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown transmission group: {}", self.0)
    }
}

impl std::error::Error for UnknownGroup {}

impl FromStr for TransmissionGroup {
    type Err = UnknownGroup;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(s))
            .map(|i| GROUPS[i])
            .ok_or_else(|| UnknownGroup(s.to_string()))
    }
}
