/// Magic bytes opening every proof artifact.
pub const MAGIC: &[u8; 4] = b"ATPF";

/// Version of the binary container layout.
pub const FORMAT_VERSION: u16 = 1;

/// Version of the JSON payload inside the container.
pub const PAYLOAD_VERSION: &str = "2.0.0";

/// Default generator name written into proof metadata.
pub const DEFAULT_GENERATOR: &str = "secretGPT";

pub const PROOF_TYPE: &str = "dual_vm_attestation";

pub const ENCRYPTION_SCHEME: &str = "scrypt+AES-256-GCM";

pub const SALT_SIZE: usize = 16;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
pub const KEY_SIZE: usize = 32;

/// Size of the authenticated header:
/// magic, format version, log_n, r, p, salt and nonce.
pub const HEADER_SIZE: usize = 4 + 2 + 1 + 4 + 4 + SALT_SIZE + NONCE_SIZE;

/// Default scrypt cost, log2 of N.
pub const DEFAULT_SCRYPT_LOG_N: u8 = 15;
/// Default scrypt block size.
pub const DEFAULT_SCRYPT_R: u32 = 8;
/// Default scrypt parallelism.
pub const DEFAULT_SCRYPT_P: u32 = 1;

/// Accepted scrypt parameter ranges when opening an artifact.
pub const SCRYPT_LOG_N_RANGE: std::ops::RangeInclusive<u8> = 10..=20;
pub const SCRYPT_R_RANGE: std::ops::RangeInclusive<u32> = 1..=32;
pub const SCRYPT_P_RANGE: std::ops::RangeInclusive<u32> = 1..=4;

/// Upper bound of the scrypt working buffer, `128 * r * 2^log_n` bytes.
pub const SCRYPT_MAX_MEMORY_BYTES: u64 = 256 * 1024 * 1024;

/// File name prefix and extension of saved artifacts.
pub const ARTIFACT_FILE_PREFIX: &str = "secretgpt_proof_";
pub const ARTIFACT_FILE_EXTENSION: &str = "attestproof";
