//! # VimiOTP – TOTP credential engine
//!
//! Everything needed to keep a list of TOTP credentials and show their
//! current codes:
//!
//! - **Base32** – RFC 4648 secret decoding
//! - **TOTP** – RFC 6238 code generation, HMAC-SHA1 only, 6–8 digits
//! - **otpauth:// URIs** – Parsing and batch dedup of scanned payloads
//! - **Store** – Ordered credential list behind a persistence trait
//! - **Scheduler** – 1 Hz countdown with boundary-synchronized refresh
//! - **Scan** – QR image pipeline over pluggable source/decoder traits
//! - **Export** – Plain JSON backup and restore

pub mod otp;
