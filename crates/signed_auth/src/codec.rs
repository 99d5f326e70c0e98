//! Wire form of a credential.
//!
//! ```text
//! username|provider|YYYYMMDD.HHMMSSmmm[|signature]
//! ```
//!
//! Everything after the third `|` is the signature, even if it contains
//! further `|` characters. Decoding pads the signature with trailing `=`
//! until its length is a multiple of 4, so transports that strip base64
//! padding still round-trip.

use crate::credential::Credential;
use crate::error::DecodeError;
use crate::timestamp::Timestamp;

pub const DELIMITER: char = '|';

const FIELDS: usize = 4;

pub fn encode(credential: &Credential) -> String {
    let body = credential.unsigned_body();
    match credential.signature() {
        Some(signature) => format!("{body}{DELIMITER}{signature}"),
        None => body,
    }
}

pub fn decode(token: &str) -> Result<Credential, DecodeError> {
    let fields: Vec<&str> = token.splitn(FIELDS, DELIMITER).collect();
    if fields.len() < FIELDS || fields[0].is_empty() || fields[3].is_empty() {
        return Err(DecodeError::Malformed {
            fields: fields.len(),
        });
    }

    let timestamp = Timestamp::parse(fields[2])?;
    let signature = pad_signature(fields[3]);

    Ok(Credential::new(fields[0], fields[1], timestamp).with_signature(signature))
}

fn pad_signature(raw: &str) -> String {
    let missing = (4 - raw.len() % 4) % 4;
    let mut padded = String::with_capacity(raw.len() + missing);
    padded.push_str(raw);
    padded.extend(std::iter::repeat('=').take(missing));
    padded
}
