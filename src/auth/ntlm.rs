//! NTLM (v2) session state for one host.
//!
//! # Responsibilities
//! - Build the negotiate (type 1) message
//! - Parse the server challenge (type 2)
//! - Build the NTLMv2 authenticate (type 3) message
//! - Remember the last negotiated challenge so later requests can tell the
//!   host has already been negotiated

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

use crate::error::{Error, Result};

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

const NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | NEGOTIATE_OEM
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_128
    | NEGOTIATE_56;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: u64 = 11_644_473_600;

type HmacMd5 = Hmac<Md5>;

/// Parsed type 2 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

/// Per-host NTLM authentication state.
#[derive(Debug)]
pub struct NtlmSession {
    username: String,
    domain: String,
    password: String,
    last_challenge: Mutex<Option<Challenge>>,
}

impl NtlmSession {
    /// `username` may be `DOMAIN\user`; the domain part is split off.
    pub fn new(username: &str, password: &str) -> Self {
        let (domain, user) = match username.split_once('\\') {
            Some((d, u)) => (d.to_string(), u.to_string()),
            None => (String::new(), username.to_string()),
        };
        Self {
            username: user,
            domain,
            password: password.to_string(),
            last_challenge: Mutex::new(None),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// A challenge has been answered on this session.
    pub fn is_negotiated(&self) -> bool {
        self.last_challenge
            .lock()
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    /// `Authorization` value carrying the negotiate message.
    pub fn negotiate_header(&self) -> String {
        format!("NTLM {}", STANDARD.encode(negotiate_message()))
    }

    /// Answer a `WWW-Authenticate: NTLM <challenge>` header value.
    pub fn authenticate_header(&self, www_authenticate: &str) -> Result<String> {
        let encoded = www_authenticate
            .trim()
            .strip_prefix("NTLM")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Ntlm("server sent no NTLM challenge".to_string()))?;
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Ntlm(format!("invalid challenge encoding: {}", e)))?;
        let challenge = parse_challenge(&raw)?;

        let client_challenge: [u8; 8] = rand::random();
        let message = self.authenticate_message(&challenge, client_challenge, filetime_now())?;

        if let Ok(mut last) = self.last_challenge.lock() {
            *last = Some(challenge);
        }
        Ok(format!("NTLM {}", STANDARD.encode(message)))
    }

    fn authenticate_message(
        &self,
        challenge: &Challenge,
        client_challenge: [u8; 8],
        timestamp: u64,
    ) -> Result<Vec<u8>> {
        let key = ntowfv2(&self.username, &self.domain, &self.password)?;

        let mut blob = vec![0x01, 0x01, 0, 0, 0, 0, 0, 0];
        blob.extend_from_slice(&timestamp.to_le_bytes());
        blob.extend_from_slice(&client_challenge);
        blob.extend_from_slice(&[0; 4]);
        blob.extend_from_slice(&challenge.target_info);
        blob.extend_from_slice(&[0; 4]);

        let proof = hmac_md5(&key, &[&challenge.server_challenge[..], &blob[..]])?;
        let mut nt_response = proof.to_vec();
        nt_response.extend_from_slice(&blob);

        let lm_response = lmv2_response(&key, &challenge.server_challenge, &client_challenge)?;

        let domain = utf16le(&self.domain);
        let user = utf16le(&self.username);
        let workstation: Vec<u8> = Vec::new();

        // Header is 64 bytes; payload follows in field order.
        let mut offset = 64u32;
        let mut header = Vec::with_capacity(64);
        let mut payload = Vec::new();

        header.extend_from_slice(SIGNATURE);
        header.extend_from_slice(&3u32.to_le_bytes());
        for field in [&lm_response, &nt_response, &domain, &user, &workstation] {
            push_security_buffer(&mut header, field.len(), offset)?;
            payload.extend_from_slice(field);
            offset += field.len() as u32;
        }
        // Empty session key.
        push_security_buffer(&mut header, 0, offset)?;
        header.extend_from_slice(&((challenge.flags & NEGOTIATE_FLAGS) | NEGOTIATE_UNICODE).to_le_bytes());

        header.extend_from_slice(&payload);
        Ok(header)
    }
}

fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Empty domain and workstation buffers.
    msg.extend_from_slice(&[0; 16]);
    msg
}

/// Parse a raw type 2 message.
pub fn parse_challenge(raw: &[u8]) -> Result<Challenge> {
    if raw.len() < 32 || &raw[..8] != SIGNATURE {
        return Err(Error::Ntlm("malformed challenge message".to_string()));
    }
    if read_u32(raw, 8) != 2 {
        return Err(Error::Ntlm("expected a type 2 message".to_string()));
    }

    let flags = read_u32(raw, 20);
    let mut server_challenge = [0u8; 8];
    server_challenge.copy_from_slice(&raw[24..32]);

    let target_info = if raw.len() >= 48 {
        let len = read_u16(raw, 40) as usize;
        let off = read_u32(raw, 44) as usize;
        raw.get(off..off + len)
            .ok_or_else(|| Error::Ntlm("target info out of bounds".to_string()))?
            .to_vec()
    } else {
        Vec::new()
    };

    Ok(Challenge {
        flags,
        server_challenge,
        target_info,
    })
}

fn ntowfv2(user: &str, domain: &str, password: &str) -> Result<[u8; 16]> {
    let nt_hash = Md4::digest(utf16le(password));
    let identity = utf16le(&format!("{}{}", user.to_uppercase(), domain));
    hmac_md5(&nt_hash, &[&identity[..]])
}

fn lmv2_response(key: &[u8; 16], server: &[u8; 8], client: &[u8; 8]) -> Result<Vec<u8>> {
    let mut out = hmac_md5(key, &[&server[..], &client[..]])?.to_vec();
    out.extend_from_slice(client);
    Ok(out)
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16]> {
    let mut mac = HmacMd5::new_from_slice(key).map_err(|e| Error::Ntlm(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn push_security_buffer(buf: &mut Vec<u8>, len: usize, offset: u32) -> Result<()> {
    let len = u16::try_from(len).map_err(|_| Error::Ntlm("field too long".to_string()))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&offset.to_le_bytes());
    Ok(())
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn read_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn read_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn filetime_now() -> u64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    (secs + FILETIME_EPOCH_OFFSET) * 10_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Type 2 message with target info, as a server would send it.
    fn challenge_message(server_challenge: [u8; 8], target_info: &[u8]) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(SIGNATURE);
        msg.extend_from_slice(&2u32.to_le_bytes());
        msg.extend_from_slice(&[0, 0, 0, 0, 48, 0, 0, 0]);
        msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
        msg.extend_from_slice(&server_challenge);
        msg.extend_from_slice(&[0; 8]);
        let len = target_info.len() as u16;
        msg.extend_from_slice(&len.to_le_bytes());
        msg.extend_from_slice(&len.to_le_bytes());
        msg.extend_from_slice(&48u32.to_le_bytes());
        msg.extend_from_slice(target_info);
        msg
    }

    #[test]
    fn test_ntowfv2_known_vector() {
        let key = ntowfv2("User", "Domain", "Password").unwrap();
        assert_eq!(hex(&key), "0c868a403bfd7a93a3001ef22ef02e3f");
    }

    #[test]
    fn test_lmv2_known_vector() {
        let key = ntowfv2("User", "Domain", "Password").unwrap();
        let server = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let client = [0xaa; 8];
        let lm = lmv2_response(&key, &server, &client).unwrap();
        assert_eq!(
            hex(&lm),
            "86c35097ac9cec102554764a57cccc19aaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn test_domain_split() {
        let session = NtlmSession::new("CORP\\alice", "pw");
        assert_eq!(session.domain(), "CORP");
        assert_eq!(session.username(), "alice");

        let session = NtlmSession::new("bob", "pw");
        assert_eq!(session.domain(), "");
    }

    #[test]
    fn test_negotiate_message() {
        let header = NtlmSession::new("u", "p").negotiate_header();
        let raw = STANDARD.decode(header.strip_prefix("NTLM ").unwrap()).unwrap();
        assert_eq!(raw.len(), 32);
        assert_eq!(&raw[..8], SIGNATURE);
        assert_eq!(read_u32(&raw, 8), 1);
        assert_eq!(read_u32(&raw, 12), NEGOTIATE_FLAGS);
    }

    #[test]
    fn test_parse_challenge() {
        let raw = challenge_message([7; 8], &[2, 0, 0, 0]);
        let challenge = parse_challenge(&raw).unwrap();
        assert_eq!(challenge.server_challenge, [7; 8]);
        assert_eq!(challenge.target_info, vec![2, 0, 0, 0]);

        assert!(parse_challenge(b"garbage").is_err());
        let mut wrong_type = raw.clone();
        wrong_type[8] = 3;
        assert!(parse_challenge(&wrong_type).is_err());
    }

    #[test]
    fn test_authenticate_header() {
        let session = NtlmSession::new("Domain\\User", "Password");
        assert!(!session.is_negotiated());

        let raw = challenge_message([1; 8], &[0, 0, 0, 0]);
        let header = session
            .authenticate_header(&format!("NTLM {}", STANDARD.encode(&raw)))
            .unwrap();
        assert!(session.is_negotiated());

        let msg = STANDARD.decode(header.strip_prefix("NTLM ").unwrap()).unwrap();
        assert_eq!(&msg[..8], SIGNATURE);
        assert_eq!(read_u32(&msg, 8), 3);

        // LM response is always 24 bytes, starting right after the header.
        assert_eq!(read_u16(&msg, 12), 24);
        assert_eq!(read_u32(&msg, 16), 64);

        let user_len = read_u16(&msg, 36) as usize;
        let user_off = read_u32(&msg, 40) as usize;
        assert_eq!(&msg[user_off..user_off + user_len], utf16le("User").as_slice());
    }

    #[test]
    fn test_authenticate_header_rejects_missing_challenge() {
        let session = NtlmSession::new("u", "p");
        assert!(matches!(session.authenticate_header("NTLM"), Err(Error::Ntlm(_))));
        assert!(matches!(session.authenticate_header("Basic realm=x"), Err(Error::Ntlm(_))));
    }
}
