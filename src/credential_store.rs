//! Credential store — §4.1.
//!
//! A line-oriented INI variant persisted to `clientConfig.txt` (2 KiB
//! budget). Holds the device endpoint/serial number and the ordered list of
//! bootstrap/DM security records that feed the DTLS PSK callback
//! ([`crate::dtls::manager::ConnectionManager`]).
//!
//! Mirrors the shape of the teacher's `adapters::nvs::NvsAdapter`
//! (load/validate/write-whole-file), but the format here is a real
//! line-oriented text format rather than a serialized blob, so the bulk of
//! this module is the parser/writer in [`parse`]/[`render`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Lwm2mStatus;

/// Hard cap on the persisted file size (spec.md §4.1).
pub const MAX_FILE_SIZE: usize = 2048;

/// Hard cap on a single parsed line (spec.md §8 boundary behaviour).
pub const MAX_LINE_LENGTH: usize = 128;

// ---------------------------------------------------------------------------
// Credential identifiers (§3)
// ---------------------------------------------------------------------------

/// Closed enumeration of credential slots a caller may get/set/check/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialId {
    BsPublicKey,
    BsServerPublicKey,
    BsSecretKey,
    BsAddress,
    DmPublicKey,
    DmServerPublicKey,
    DmSecretKey,
    DmAddress,
    FwKey,
    SwKey,
}

impl CredentialId {
    /// Credential ids whose (cred, serverId) pair addresses a bootstrap
    /// record; `serverId` is ignored for these per spec.md §3.
    pub fn is_bootstrap(self) -> bool {
        matches!(
            self,
            Self::BsPublicKey | Self::BsServerPublicKey | Self::BsSecretKey | Self::BsAddress
        )
    }

    /// Credential ids that address the DM record list, keyed by server id.
    pub fn is_dm(self) -> bool {
        matches!(
            self,
            Self::DmPublicKey | Self::DmServerPublicKey | Self::DmSecretKey | Self::DmAddress
        )
    }
}

// ---------------------------------------------------------------------------
// Data model (§3)
// ---------------------------------------------------------------------------

/// Endpoint identity, immutable after the first load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralConfig {
    pub endpoint: String,
    pub serial_number: String,
}

/// A single bootstrap or DM security record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Security {
    pub server_uri: String,
    pub psk_identity: Vec<u8>,
    /// Hex-encoded PSK secret, uppercase, even length.
    pub psk_secret_hex: String,
    pub is_bootstrap: bool,
    /// Short server id; meaningless (0) for the bootstrap record.
    pub server_id: u16,
}

impl Security {
    /// Decode [`Self::psk_secret_hex`] into raw bytes.
    pub fn psk_secret(&self) -> Result<Vec<u8>, Lwm2mStatus> {
        decode_hex(&self.psk_secret_hex)
    }

    /// Validate the invariants spec.md §3 places on a single record.
    pub fn validate(&self) -> Result<(), Lwm2mStatus> {
        if self.psk_secret_hex.len() % 2 != 0 {
            return Err(Lwm2mStatus::InvalidArg);
        }
        if !self.is_bootstrap && self.server_id == 0 {
            return Err(Lwm2mStatus::InvalidArg);
        }
        parse_server_uri(&self.server_uri)?;
        Ok(())
    }
}

/// Scheme of a parsed `serverUri`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriScheme {
    Coap,
    Coaps,
}

/// Parsed `coap://host[:port]` / `coaps://host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerUri {
    pub scheme: UriScheme,
    pub host: String,
    pub port: u16,
}

/// Parse and validate a `serverUri` per spec.md §3.
pub fn parse_server_uri(uri: &str) -> Result<ServerUri, Lwm2mStatus> {
    let (scheme, rest) = if let Some(rest) = uri.strip_prefix("coaps://") {
        (UriScheme::Coaps, rest)
    } else if let Some(rest) = uri.strip_prefix("coap://") {
        (UriScheme::Coap, rest)
    } else {
        return Err(Lwm2mStatus::InvalidArg);
    };
    if rest.is_empty() {
        return Err(Lwm2mStatus::InvalidArg);
    }
    let default_port = match scheme {
        UriScheme::Coap => 5683,
        UriScheme::Coaps => 5684,
    };
    let (host, port) = match rest.rsplit_once(':') {
        Some((h, p)) if !h.is_empty() && p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() => {
            let port: u16 = p.parse().map_err(|_| Lwm2mStatus::InvalidArg)?;
            (h.to_string(), port)
        }
        _ => (rest.to_string(), default_port),
    };
    Ok(ServerUri { scheme, host, port })
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// A parse failure, carrying the 1-based offending line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError(pub usize);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed credential store line {}", self.0)
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// In-memory representation: preserves comments/ordering for write-one
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Line {
    /// Blank line or a full-line comment; kept byte-identical.
    Verbatim(String),
    /// `[SECTION]` header, possibly with a trailing comment.
    Section(String),
    /// `NAME = VALUE` pair, with an optional trailing comment preserved.
    Pair {
        name: String,
        value: String,
        trailing_comment: Option<String>,
    },
}

/// The parsed, editable credential store document.
#[derive(Debug, Clone)]
pub struct Document {
    lines: Vec<Line>,
}

const SEC_GENERAL: &str = "GENERAL";
const SEC_BOOTSTRAP: &str = "BOOTSTRAP SECURITY";
const SEC_LWM2M: &str = "LWM2M SECURITY";

impl Document {
    /// An empty document (three sections, no keys) — the starting point for
    /// a fresh device.
    pub fn empty() -> Self {
        Self {
            lines: vec![
                Line::Section(SEC_GENERAL.to_string()),
                Line::Section(SEC_BOOTSTRAP.to_string()),
                Line::Section(SEC_LWM2M.to_string()),
            ],
        }
    }

    /// Parse a full document, rejecting the first malformed line.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut lines = Vec::new();
        let mut current_section: Option<String> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if raw_line.len() > MAX_LINE_LENGTH {
                return Err(ParseError(line_no));
            }

            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                lines.push(Line::Verbatim(raw_line.to_string()));
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let Some(inner) = rest.strip_suffix(']') else {
                    return Err(ParseError(line_no));
                };
                let section = inner.trim().to_string();
                if section.is_empty() {
                    return Err(ParseError(line_no));
                }
                current_section = Some(section.clone());
                lines.push(Line::Section(section));
                continue;
            }

            if current_section.is_none() {
                return Err(ParseError(line_no));
            }

            let (body, trailing_comment) = split_trailing_comment(trimmed);
            let Some((name, value)) = body.split_once('=') else {
                return Err(ParseError(line_no));
            };
            let name = name.trim().to_string();
            let value = value.trim().to_string();
            if name.is_empty() {
                return Err(ParseError(line_no));
            }
            lines.push(Line::Pair {
                name,
                value,
                trailing_comment,
            });
        }

        Ok(Self { lines })
    }

    /// Render back to text, byte-for-byte stable for untouched lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Verbatim(s) => {
                    out.push_str(s);
                    out.push('\n');
                }
                Line::Section(s) => {
                    out.push('[');
                    out.push_str(s);
                    out.push_str("]\n");
                }
                Line::Pair {
                    name,
                    value,
                    trailing_comment,
                } => {
                    out.push_str(name);
                    out.push_str(" = ");
                    out.push_str(value);
                    if let Some(c) = trailing_comment {
                        out.push_str(" ; ");
                        out.push_str(c);
                    }
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Look up `(section, name)`, returning the parsed value if present.
    pub fn get(&self, section: &str, name: &str) -> Option<&str> {
        let mut in_section = false;
        for line in &self.lines {
            match line {
                Line::Section(s) => in_section = s.eq_ignore_ascii_case(section),
                Line::Pair { name: n, value, .. } if in_section && n == name => {
                    return Some(value.as_str());
                }
                _ => {}
            }
        }
        None
    }

    /// Read-modify-write a single `(section, name)` pair, per spec.md §4.1's
    /// write-one locality contract: in-place replace, append within section,
    /// or append a brand-new section.
    pub fn write_one(&mut self, section: &str, name: &str, value: &str) -> Result<(), Lwm2mStatus> {
        if value.len() > MAX_LINE_LENGTH {
            return Err(Lwm2mStatus::Overflow);
        }

        // 1. In-place replace if the pair already exists.
        let mut in_section = false;
        let mut section_start: Option<usize> = None;
        let mut section_end: Option<usize> = None;
        for (i, line) in self.lines.iter_mut().enumerate() {
            match line {
                Line::Section(s) => {
                    in_section = s.eq_ignore_ascii_case(section);
                    if in_section {
                        section_start = Some(i);
                    } else if section_start.is_some() && section_end.is_none() {
                        section_end = Some(i);
                    }
                }
                Line::Pair { name: n, value: v, .. } if in_section && n == name => {
                    *v = value.to_string();
                    return Self::check_budget_len(self);
                }
                _ => {}
            }
        }
        if section_start.is_some() && section_end.is_none() {
            section_end = Some(self.lines.len());
        }

        // 2. Section exists, key doesn't: append within the section.
        if let Some(end) = section_end {
            self.lines.insert(
                end,
                Line::Pair {
                    name: name.to_string(),
                    value: value.to_string(),
                    trailing_comment: None,
                },
            );
            return Self::check_budget_len(self);
        }

        // 3. Neither exists: append a new section header and the pair.
        self.lines.push(Line::Section(section.to_string()));
        self.lines.push(Line::Pair {
            name: name.to_string(),
            value: value.to_string(),
            trailing_comment: None,
        });
        Self::check_budget_len(self)
    }

    fn check_budget_len(&self) -> Result<(), Lwm2mStatus> {
        if self.render().len() > MAX_FILE_SIZE {
            return Err(Lwm2mStatus::Overflow);
        }
        Ok(())
    }
}

fn split_trailing_comment(s: &str) -> (&str, Option<String>) {
    for (i, c) in s.char_indices() {
        if c == ';' || c == '#' {
            let comment = s[i + 1..].trim();
            return (s[..i].trim_end(), Some(comment.to_string()));
        }
    }
    (s, None)
}

// ---------------------------------------------------------------------------
// Hex helpers (§8 hex round-trip property)
// ---------------------------------------------------------------------------

/// Render `bytes` as uppercase, even-length hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode a hex string, case-insensitively, rejecting odd length / non-hex.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, Lwm2mStatus> {
    if s.len() % 2 != 0 {
        return Err(Lwm2mStatus::InvalidArg);
    }
    hex::decode(s).map_err(|_| Lwm2mStatus::InvalidArg)
}

// ---------------------------------------------------------------------------
// Config (parsed view over a Document)
// ---------------------------------------------------------------------------

/// The fully decoded credential store contents.
#[derive(Debug, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    pub bootstrap: Option<Security>,
    pub dm: Vec<Security>,
}

impl Config {
    fn from_document(doc: &Document) -> Result<Self, Lwm2mStatus> {
        let endpoint = doc.get(SEC_GENERAL, "ENDPOINT").unwrap_or("").to_string();
        let serial_number = doc.get(SEC_GENERAL, "SN").unwrap_or("").to_string();

        let bootstrap = match (
            doc.get(SEC_BOOTSTRAP, "SERVER_URI"),
            doc.get(SEC_BOOTSTRAP, "DEVICE_PKID"),
            doc.get(SEC_BOOTSTRAP, "SECRET_KEY"),
        ) {
            (Some(uri), pkid, secret) => Some(Security {
                server_uri: uri.to_string(),
                psk_identity: pkid.map(decode_hex).transpose()?.unwrap_or_default(),
                psk_secret_hex: secret.unwrap_or("").to_uppercase(),
                is_bootstrap: true,
                server_id: 0,
            }),
            _ => None,
        };

        let mut dm = Vec::new();
        let mut seen_ids = std::collections::BTreeSet::new();
        for (name, _) in doc
            .lines
            .iter()
            .filter_map(|l| match l {
                Line::Pair { name, value, .. } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect::<Vec<_>>()
        {
            if let Some(id_str) = name.strip_prefix("SERVER_URI ") {
                let Ok(id) = id_str.trim().parse::<u16>() else {
                    continue;
                };
                if !seen_ids.insert(id) {
                    continue;
                }
                let uri = doc
                    .get(SEC_LWM2M, &format!("SERVER_URI {id}"))
                    .unwrap_or("")
                    .to_string();
                let pkid = doc
                    .get(SEC_LWM2M, &format!("DEVICE_PKID {id}"))
                    .map(decode_hex)
                    .transpose()?
                    .unwrap_or_default();
                let secret = doc
                    .get(SEC_LWM2M, &format!("SECRET_KEY {id}"))
                    .unwrap_or("")
                    .to_uppercase();
                dm.push(Security {
                    server_uri: uri,
                    psk_identity: pkid,
                    psk_secret_hex: secret,
                    is_bootstrap: false,
                    server_id: id,
                });
            }
        }
        dm.sort_by_key(|s| s.server_id);

        Ok(Self {
            general: GeneralConfig {
                endpoint,
                serial_number,
            },
            bootstrap,
            dm,
        })
    }

    /// Return the unique DM record for `server_id`, if any (§8 credential
    /// selection property).
    pub fn get_dm_by_id(&self, server_id: u16) -> Option<&Security> {
        self.dm.iter().find(|s| s.server_id == server_id)
    }

    pub fn get_bootstrap(&self) -> Option<&Security> {
        self.bootstrap.as_ref()
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// File-backed credential store, the production entry point for §4.1.
pub struct CredentialStore {
    path: PathBuf,
    doc: Document,
}

impl CredentialStore {
    /// Load (or initialise) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read_to_string(&path) {
            Ok(text) => Document::parse(&text)?,
            Err(_) => Document::empty(),
        };
        Ok(Self { path, doc })
    }

    /// Parsed view of the current in-memory document.
    pub fn config(&self) -> Result<Config, Lwm2mStatus> {
        Config::from_document(&self.doc)
    }

    /// `writeOne` followed by an atomic whole-file rewrite (§4.1).
    pub fn write_one(&mut self, section: &str, name: &str, value: &str) -> Result<usize, Lwm2mStatus> {
        self.doc.write_one(section, name, value)?;
        self.flush()
    }

    /// Delete a single `(section, name)` pair if present; no-op otherwise.
    pub fn delete_one(&mut self, section: &str, name: &str) -> Result<usize, Lwm2mStatus> {
        let mut in_section = false;
        let mut remove_at = None;
        for (i, line) in self.doc.lines.iter().enumerate() {
            match line {
                Line::Section(s) => in_section = s.eq_ignore_ascii_case(section),
                Line::Pair { name: n, .. } if in_section && n == name => {
                    remove_at = Some(i);
                    break;
                }
                _ => {}
            }
        }
        if let Some(i) = remove_at {
            self.doc.lines.remove(i);
        }
        self.flush()
    }

    /// Delete every DM credential key for `server_id` (spec.md §4.5 "on
    /// registration failure").
    pub fn delete_dm(&mut self, server_id: u16) -> Result<(), Lwm2mStatus> {
        for key in ["SERVER_URI", "DEVICE_PKID", "SECRET_KEY"] {
            self.delete_one(SEC_LWM2M, &format!("{key} {server_id}"))?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<usize, Lwm2mStatus> {
        let rendered = self.doc.render();
        if rendered.len() > MAX_FILE_SIZE {
            return Err(Lwm2mStatus::Overflow);
        }
        fs::write(&self.path, &rendered).map_err(|_| Lwm2mStatus::GeneralError)?;
        Ok(rendered.len())
    }
}

/// GET/SET/CHECK/DELETE dispatch by [`CredentialId`], matching spec.md §3's
/// "each GET/SET/CHECK/DELETE is parameterised by (credId, serverId)".
impl CredentialStore {
    fn key_for(cred: CredentialId, server_id: u16) -> Option<(&'static str, String)> {
        // Bootstrap credentials ignore `server_id` entirely (spec.md §3).
        let dm_suffix = |base: &str| format!("{base} {server_id}");
        match cred {
            CredentialId::BsAddress => Some((SEC_BOOTSTRAP, "SERVER_URI".to_string())),
            CredentialId::BsPublicKey => Some((SEC_BOOTSTRAP, "DEVICE_PKID".to_string())),
            CredentialId::BsSecretKey => Some((SEC_BOOTSTRAP, "SECRET_KEY".to_string())),
            CredentialId::DmAddress => Some((SEC_LWM2M, dm_suffix("SERVER_URI"))),
            CredentialId::DmPublicKey => Some((SEC_LWM2M, dm_suffix("DEVICE_PKID"))),
            CredentialId::DmSecretKey => Some((SEC_LWM2M, dm_suffix("SECRET_KEY"))),
            // §4.1's file format has no slot for the server's own public key;
            // unlike `BsPublicKey`/`DmPublicKey` (the *device's* identity,
            // stored as DEVICE_PKID) there is nowhere to persist this
            // distinct field, so it is unsupported like `FwKey`/`SwKey`.
            CredentialId::BsServerPublicKey
            | CredentialId::DmServerPublicKey
            | CredentialId::FwKey
            | CredentialId::SwKey => None,
        }
    }

    /// `GET` a credential value as raw bytes (hex-decoded for PSK secrets).
    pub fn get(&self, cred: CredentialId, server_id: u16) -> Result<Vec<u8>, Lwm2mStatus> {
        let (section, name) = Self::key_for(cred, server_id).ok_or(Lwm2mStatus::OpNotSupported)?;
        let value = self.doc.get(section, &name).ok_or(Lwm2mStatus::GeneralError)?;
        match cred {
            CredentialId::BsSecretKey | CredentialId::DmSecretKey => decode_hex(value),
            CredentialId::BsPublicKey | CredentialId::DmPublicKey => decode_hex(value),
            _ => Ok(value.as_bytes().to_vec()),
        }
    }

    /// `SET` a credential value; PSK secrets/identities are hex-encoded.
    pub fn set(&mut self, cred: CredentialId, server_id: u16, data: &[u8]) -> Result<(), Lwm2mStatus> {
        let (section, name) = Self::key_for(cred, server_id).ok_or(Lwm2mStatus::OpNotSupported)?;
        let value = match cred {
            CredentialId::BsSecretKey | CredentialId::DmSecretKey => encode_hex(data),
            CredentialId::BsPublicKey | CredentialId::DmPublicKey => encode_hex(data),
            _ => String::from_utf8(data.to_vec()).map_err(|_| Lwm2mStatus::InvalidArg)?,
        };
        self.write_one(section, &name, &value)?;
        Ok(())
    }

    /// `CHECK` whether a credential is present and non-empty.
    pub fn check(&self, cred: CredentialId, server_id: u16) -> bool {
        let Some((section, name)) = Self::key_for(cred, server_id) else {
            return false;
        };
        self.doc
            .get(section, &name)
            .is_some_and(|v| !v.is_empty())
    }

    /// `DELETE` a credential slot.
    pub fn delete(&mut self, cred: CredentialId, server_id: u16) -> Result<(), Lwm2mStatus> {
        let (section, name) = Self::key_for(cred, server_id).ok_or(Lwm2mStatus::OpNotSupported)?;
        self.delete_one(section, &name)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DTLS PSK lookup adapter
// ---------------------------------------------------------------------------

/// Bridges the credential store to [`crate::dtls::engine::PskProvider`] —
/// the DTLS engine's "core callback" (§4.4) resolves straight through to
/// the bootstrap/DM security records.
pub struct CredentialPskProvider<'a> {
    store: &'a CredentialStore,
}

impl<'a> CredentialPskProvider<'a> {
    pub fn new(store: &'a CredentialStore) -> Self {
        Self { store }
    }
}

impl crate::dtls::engine::PskProvider for CredentialPskProvider<'_> {
    fn psk_for(&self, is_bootstrap: bool, server_id: u16) -> Result<(Vec<u8>, Vec<u8>), Lwm2mStatus> {
        let config = self.store.config()?;
        let security = if is_bootstrap {
            config.get_bootstrap()
        } else {
            config.get_dm_by_id(server_id)
        }
        .ok_or(Lwm2mStatus::ConnectError)?;
        Ok((security.psk_identity.clone(), security.psk_secret()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
