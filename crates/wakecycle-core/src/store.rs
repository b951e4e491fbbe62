//! Persistent store initialization
//!
//! The store owns a flash region that starts with a small header naming its
//! layout version. Initialization checks the header; a store written by an
//! incompatible layout (or holding garbage) is erased and initialized again,
//! once. Anything beyond that is a hard failure.

use embedded_storage::nor_flash::NorFlash;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::error::{ErrorText, error_text};

/// Identifies a region initialized by this firmware
pub const STORE_MAGIC: [u8; 4] = *b"WKCY";

/// Bumped whenever the on-flash layout changes
pub const STORE_LAYOUT_VERSION: u16 = 1;

/// Bytes reserved for the header at the start of the region.
/// A multiple of the flash write granularity.
pub const HEADER_LEN: usize = 32;

const ERASED: u8 = 0xFF;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    pub magic: [u8; 4],
    pub version: u16,
}

impl StoreHeader {
    pub const fn current() -> Self {
        Self {
            magic: STORE_MAGIC,
            version: STORE_LAYOUT_VERSION,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store layout version {found} does not match {expected}")]
    NewVersionFound { found: u16, expected: u16 },
    #[error("store header is corrupt")]
    Corrupt,
    #[error("flash device error: {0}")]
    Device(ErrorText),
}

impl StoreError {
    /// Layout problems are cured by an erase; device errors are not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NewVersionFound { .. } | Self::Corrupt)
    }
}

/// How the store came up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreInit {
    Ready,
    /// The region was erased and initialized again
    Reinitialized,
}

pub trait PersistentStore {
    /// Open the store, reporting layout problems without fixing them
    fn init(&mut self) -> Result<(), StoreError>;

    /// Wipe the whole region
    fn erase(&mut self) -> Result<(), StoreError>;
}

/// Initialize `store`, erasing and retrying exactly once on a layout mismatch
pub fn init_store<S: PersistentStore>(store: &mut S) -> Result<StoreInit, StoreError> {
    match store.init() {
        Ok(()) => Ok(StoreInit::Ready),
        Err(e) if e.is_recoverable() => {
            warn!("Persistent store unusable ({}), erasing", e);
            store.erase()?;
            store.init()?;
            info!("Persistent store reinitialized");
            Ok(StoreInit::Reinitialized)
        }
        Err(e) => Err(e),
    }
}

/// A [`PersistentStore`] over a window of a NOR flash device
pub struct FlashStore<F: NorFlash> {
    flash: F,
    offset: u32,
    len: u32,
}

impl<F: NorFlash> FlashStore<F> {
    /// `offset` and `len` must be aligned to the flash erase size
    pub fn new(flash: F, offset: u32, len: u32) -> Self {
        Self { flash, offset, len }
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    fn read_header(&mut self) -> Result<[u8; HEADER_LEN], StoreError> {
        let mut buf = [0u8; HEADER_LEN];
        self.flash
            .read(self.offset, &mut buf)
            .map_err(|e| StoreError::Device(error_text(&e)))?;
        Ok(buf)
    }

    fn write_header(&mut self) -> Result<(), StoreError> {
        let mut buf = [ERASED; HEADER_LEN];
        postcard::to_slice(&StoreHeader::current(), &mut buf)
            .map_err(|e| StoreError::Device(error_text(&e)))?;
        self.flash
            .write(self.offset, &buf)
            .map_err(|e| StoreError::Device(error_text(&e)))
    }
}

impl<F: NorFlash> PersistentStore for FlashStore<F> {
    fn init(&mut self) -> Result<(), StoreError> {
        let raw = self.read_header()?;

        if raw.iter().all(|&b| b == ERASED) {
            info!("Persistent store is blank, writing layout v{}", STORE_LAYOUT_VERSION);
            return self.write_header();
        }

        let header: StoreHeader = postcard::from_bytes(&raw).map_err(|_| StoreError::Corrupt)?;
        if header.magic != STORE_MAGIC {
            return Err(StoreError::Corrupt);
        }
        if header.version != STORE_LAYOUT_VERSION {
            return Err(StoreError::NewVersionFound {
                found: header.version,
                expected: STORE_LAYOUT_VERSION,
            });
        }
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        self.flash
            .erase(self.offset, self.offset + self.len)
            .map_err(|e| StoreError::Device(error_text(&e)))
    }
}
