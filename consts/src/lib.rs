#![no_std]

/// Base address of the internal flash in the MCU address space.
/// All flash driver offsets used by the bootloader are relative to this address.
pub const FLASH_BASE: u32 = 0x0040_0000;

/// Total size of the internal flash (256KB).
pub const FLASH_SIZE: u32 = 0x0004_0000;

/// Size of a flash page in bytes.
/// A page is the smallest unit that can be programmed independently.
pub const FLASH_PAGE_SIZE: u32 = 512;

/// Number of pages erased by a single erase command.
/// The flash controller only erases in bursts of 8 pages (4KB), so every erasable
/// region must start and end on a burst boundary.
pub const FLASH_ERASE_BURST_PAGES: u32 = 8;

/// Size of one erase burst in bytes (4KB).
pub const FLASH_ERASE_BURST_SIZE: u32 = FLASH_PAGE_SIZE * FLASH_ERASE_BURST_PAGES;

/// Size of the bootloader partition at the start of flash (32KB).
pub const BOOT_LEN: u32 = 0x0000_8000;

/// Start address of the signature partition.
/// Placed right after the bootloader, it holds the 64 byte firmware signature and the lock byte.
pub const SIG_START: u32 = FLASH_BASE + BOOT_LEN;

/// Size of the signature partition (4KB), one erase burst.
pub const SIG_LEN: u32 = 0x0000_1000;

/// Start address of the application partition.
pub const APP_START: u32 = FLASH_BASE + BOOT_LEN + SIG_LEN;

/// Size of the application partition (220KB), everything after the signature partition.
pub const APP_LEN: u32 = FLASH_SIZE - BOOT_LEN - SIG_LEN;

/// Number of flash pages in the application partition.
pub const APP_PAGE_NUM: u32 = APP_LEN / FLASH_PAGE_SIZE;

/// Number of flash pages transferred by a single write command.
pub const PAGES_PER_CHUNK: u32 = 8;

/// Size of a firmware chunk in bytes (4KB).
pub const CHUNK_LEN: u32 = FLASH_PAGE_SIZE * PAGES_PER_CHUNK;

/// Number of chunks covering the application partition.
pub const CHUNK_NUM: u32 = APP_LEN / CHUNK_LEN;

/// Number of leading command bytes: one opcode byte and one parameter byte.
pub const OP_LEN: usize = 2;

/// Size of a command and of a report exchanged with the host.
/// A write command carries exactly one chunk after the opcode bytes.
pub const REPORT_SIZE: usize = 4098;

/// Size of the firmware signature stored at the start of the signature partition.
pub const SIGNATURE_LEN: usize = 64;

/// Size of the hex encoded signature carried by a verify command.
pub const SIGNATURE_HEX_LEN: usize = SIGNATURE_LEN * 2;

/// Size of the hex encoded firmware fingerprint returned in a verify report.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Offset of the lock byte inside the signature partition (its last byte).
pub const LOCK_BYTE_OFFSET: u32 = SIG_LEN - 1;

/// Value of a byte in erased flash.
pub const ERASED_BYTE: u8 = 0xFF;

/// Compressed secp256k1 public key that firmware images must be signed with.
pub const PUBKEY: [u8; 33] = [
    0x02, 0xa1, 0x13, 0x7c, 0x6b, 0xdd, 0x49, 0x73, 0x58, 0x53, 0x7d, 0xf7, 0x7d, 0x13, 0x75, 0xa7, 0x41, 0xed, 0x75,
    0x46, 0x1b, 0x70, 0x6a, 0x61, 0x2a, 0x37, 0x17, 0xd3, 0x27, 0x48, 0xe5, 0xac, 0xf1,
];

const _: () = assert!(APP_LEN % CHUNK_LEN == 0);
const _: () = assert!(APP_LEN % FLASH_ERASE_BURST_SIZE == 0);
const _: () = assert!(SIG_LEN == FLASH_ERASE_BURST_SIZE);
const _: () = assert!(CHUNK_NUM <= u8::MAX as u32 + 1);
const _: () = assert!(OP_LEN + SIGNATURE_HEX_LEN <= REPORT_SIZE);
