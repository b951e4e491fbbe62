//! Boot-timing ledger and its retained-memory image
//!
//! The ledger holds seven timestamps (microseconds since boot) taken at fixed
//! points of a wake cycle. It is carried from one cycle to the next in memory
//! that survives deep sleep, and published one cycle later.

/// Number of timestamps in the ledger
pub const LEDGER_SLOTS: usize = 7;

/// Marks an image written by this firmware (`"WCYL"`)
pub const RETAINED_MAGIC: u32 = 0x5743_594C;

/// Size of a [`RetainedImage`] in its byte encoding
pub const RETAINED_LEN: usize = 4 + 4 + 8 * LEDGER_SLOTS + 4;

/// Point in the wake cycle a ledger slot is recorded at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Persistent store initialized
    StoreReady,
    /// IPv4 address acquired
    NetworkJoined,
    /// Broker session established
    BrokerConnected,
    /// Subscription acknowledged
    Subscribed,
    /// Publish acknowledged
    Published,
    /// Messaging finished, before teardown
    PreSleep,
    /// Wake timer armed
    SleepArmed,
}

impl Slot {
    /// All slots in ledger order
    pub const ALL: [Slot; LEDGER_SLOTS] = [
        Slot::StoreReady,
        Slot::NetworkJoined,
        Slot::BrokerConnected,
        Slot::Subscribed,
        Slot::Published,
        Slot::PreSleep,
        Slot::SleepArmed,
    ];

    /// Position of this slot in the ledger
    pub const fn index(self) -> usize {
        match self {
            Self::StoreReady => 0,
            Self::NetworkJoined => 1,
            Self::BrokerConnected => 2,
            Self::Subscribed => 3,
            Self::Published => 4,
            Self::PreSleep => 5,
            Self::SleepArmed => 6,
        }
    }

    /// Short label for log output
    pub const fn label(self) -> &'static str {
        match self {
            Self::StoreReady => "store-ready",
            Self::NetworkJoined => "network-joined",
            Self::BrokerConnected => "broker-connected",
            Self::Subscribed => "subscribed",
            Self::Published => "published",
            Self::PreSleep => "pre-sleep",
            Self::SleepArmed => "sleep-armed",
        }
    }
}

/// Seven timestamps in microseconds since boot, zero when not reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ledger {
    slots: [i64; LEDGER_SLOTS],
}

impl Ledger {
    pub const fn zeroed() -> Self {
        Self {
            slots: [0; LEDGER_SLOTS],
        }
    }

    pub const fn from_slots(slots: [i64; LEDGER_SLOTS]) -> Self {
        Self { slots }
    }

    /// Store `micros` in `slot`, replacing any earlier value
    pub fn record(&mut self, slot: Slot, micros: i64) {
        self.slots[slot.index()] = micros;
    }

    pub fn get(&self, slot: Slot) -> i64 {
        self.slots[slot.index()]
    }

    pub fn slots(&self) -> &[i64; LEDGER_SLOTS] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots = [0; LEDGER_SLOTS];
    }

    pub fn is_zeroed(&self) -> bool {
        self.slots.iter().all(|&v| v == 0)
    }
}

/// The ledger as laid out in retained (RTC) memory
///
/// After a power loss retained memory holds arbitrary bytes, so the image
/// carries a magic and checksum. Anything that fails validation reads back as
/// an all-zero ledger at cycle 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct RetainedImage {
    magic: u32,
    cycle: u32,
    slots: [i64; LEDGER_SLOTS],
    checksum: u32,
}

impl RetainedImage {
    /// An image that never validates; the initial value of a retained static
    pub const fn blank() -> Self {
        Self {
            magic: 0,
            cycle: 0,
            slots: [0; LEDGER_SLOTS],
            checksum: 0,
        }
    }

    /// Build a valid image holding `ledger` for wake cycle `cycle`
    pub fn seal(cycle: u32, ledger: &Ledger) -> Self {
        Self {
            magic: RETAINED_MAGIC,
            cycle,
            slots: ledger.slots,
            checksum: checksum(RETAINED_MAGIC, cycle, &ledger.slots),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == RETAINED_MAGIC && self.checksum == checksum(self.magic, self.cycle, &self.slots)
    }

    /// The stored ledger, or zeros when the image is not valid
    pub fn ledger(&self) -> Ledger {
        if self.is_valid() {
            Ledger::from_slots(self.slots)
        } else {
            Ledger::zeroed()
        }
    }

    /// The stored cycle count, or 0 when the image is not valid
    pub fn cycle(&self) -> u32 {
        if self.is_valid() { self.cycle } else { 0 }
    }

    /// Little-endian encoding, for regions that only hold plain bytes
    pub fn to_bytes(&self) -> [u8; RETAINED_LEN] {
        let mut out = [0u8; RETAINED_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.cycle.to_le_bytes());
        for (i, slot) in self.slots.iter().enumerate() {
            let at = 8 + i * 8;
            out[at..at + 8].copy_from_slice(&slot.to_le_bytes());
        }
        out[RETAINED_LEN - 4..].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    /// Inverse of [`Self::to_bytes`]. Does not validate.
    pub fn from_bytes(raw: &[u8; RETAINED_LEN]) -> Self {
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);

        let mut slots = [0i64; LEDGER_SLOTS];
        for (i, slot) in slots.iter_mut().enumerate() {
            let at = 8 + i * 8;
            let mut b = [0u8; 8];
            b.copy_from_slice(&raw[at..at + 8]);
            *slot = i64::from_le_bytes(b);
        }

        Self {
            magic: word(0),
            cycle: word(4),
            slots,
            checksum: word(RETAINED_LEN - 4),
        }
    }
}

// 32-bit FNV-1a
fn checksum(magic: u32, cycle: u32, slots: &[i64; LEDGER_SLOTS]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    let mut feed = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= b as u32;
            hash = hash.wrapping_mul(PRIME);
        }
    };

    feed(&magic.to_le_bytes());
    feed(&cycle.to_le_bytes());
    for slot in slots {
        feed(&slot.to_le_bytes());
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_indices_follow_ledger_order() {
        for (i, slot) in Slot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn test_clear_zeroes_every_slot() {
        let mut ledger = Ledger::from_slots([1, 2, 3, 4, 5, 6, 7]);
        assert!(!ledger.is_zeroed());

        ledger.clear();

        assert!(ledger.is_zeroed());
        assert_eq!(ledger, Ledger::zeroed());
    }

    #[test]
    fn test_record_overwrites_single_slot() {
        let mut ledger = Ledger::zeroed();
        ledger.record(Slot::Subscribed, 3_000_000);
        ledger.record(Slot::Subscribed, 3_100_000);

        assert_eq!(ledger.get(Slot::Subscribed), 3_100_000);
        assert_eq!(ledger.slots(), &[0, 0, 0, 3_100_000, 0, 0, 0]);
    }

    #[test]
    fn test_sealed_image_reads_back() {
        let ledger = Ledger::from_slots([1_000_000, 2_500_000, 3_000_000, 3_100_000, 3_200_000, 0, 0]);
        let image = RetainedImage::seal(41, &ledger);

        assert!(image.is_valid());
        assert_eq!(image.ledger(), ledger);
        assert_eq!(image.cycle(), 41);
    }

    #[test]
    fn test_blank_image_reads_as_zeros() {
        let image = RetainedImage::blank();

        assert!(!image.is_valid());
        assert!(image.ledger().is_zeroed());
        assert_eq!(image.cycle(), 0);
    }

    #[test]
    fn test_flipped_bit_invalidates_image() {
        let ledger = Ledger::from_slots([10, 20, 30, 40, 50, 60, 70]);
        let mut image = RetainedImage::seal(3, &ledger);
        image.slots[4] ^= 1 << 12;

        assert!(!image.is_valid());
        assert!(image.ledger().is_zeroed());
    }

    #[test]
    fn test_byte_encoding_preserves_validity() {
        let ledger = Ledger::from_slots([-1, 0, i64::MAX, 4, 5, 6, 7]);
        let image = RetainedImage::seal(u32::MAX, &ledger);

        let back = RetainedImage::from_bytes(&image.to_bytes());
        assert_eq!(back, image);
        assert!(back.is_valid());
    }

    #[test]
    fn test_random_bytes_do_not_validate() {
        let raw = [0xA5u8; RETAINED_LEN];
        let image = RetainedImage::from_bytes(&raw);

        assert!(!image.is_valid());
        assert_eq!(image.cycle(), 0);
    }

    #[test]
    fn test_wrong_magic_invalidates_image() {
        let ledger = Ledger::from_slots([10, 20, 30, 40, 50, 60, 70]);
        let mut image = RetainedImage::seal(3, &ledger);
        image.magic = 0xDEAD_BEEF;
        image.checksum = checksum(image.magic, image.cycle, &image.slots);

        assert!(!image.is_valid());
    }
}
