//! Shared test constants

/// 64-hex-character raw encryption key
pub const RAW_KEY: &str = "8c1d3f5a7b9e0c2d4f6a8b0c1e3d5f7a9b0c2e4d6f8a0b1c3e5d7f9a0b2c4e6d";

/// Passphrase-mode secret
pub const PASSPHRASE: &str = "local-dev-dataroom";

pub const HELLO: &[u8] = b"hello world";

pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

pub const BUCKET: &str = "replit-objstore-test";
