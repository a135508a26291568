//! Turns rendered diagram text into a plantuml.com URL: zlib-compress, encode with PlantUML's
//! own custom base64 alphabet, and — when a pipeline runs in encrypted mode — AES-128-CFB
//! encrypt the encoded text before hex-encoding it.
//!
//! The AES key is fixed and public (`change this pass`, hex `6368616e676520746869732070617373`):
//! this step buys wire-format compatibility with plantuml.com's own encrypted-link convention,
//! not confidentiality. Treat a link as exactly as sensitive as the diagram text it carries.

use std::io::{Read, Write};

use aes::Aes128;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::RngCore;

use crate::error::PipelineError;

const FIXED_KEY: [u8; 16] = *b"change this pass";

const ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

const PLANTUML_BASE: &str = "http://plantuml.com/plantuml/svg/~1";

type CfbEncryptor = cfb_mode::Encryptor<Aes128>;
type CfbDecryptor = cfb_mode::Decryptor<Aes128>;

/// Compresses and encodes `diagram`, encrypting the result when `encrypted` is set, and returns
/// a ready-to-open plantuml.com URL.
pub fn link(diagram: &str, encrypted: bool) -> String {
    let compressed = compress(diagram.as_bytes());
    let encoded = custom_base64_encode(&compressed);
    let payload = if encrypted {
        hex::encode(encrypt(encoded.as_bytes()))
    } else {
        encoded
    };
    format!("{PLANTUML_BASE}{payload}")
}

/// Inverts [`link`]'s encoding (not its URL prefix): given the payload segment and whether it
/// was encrypted, recovers the original diagram text. Used by the round-trip test and by any
/// tooling that needs to read a link back.
pub fn decode(payload: &str, encrypted: bool) -> Result<String, PipelineError> {
    let encoded = if encrypted {
        let ciphertext = hex::decode(payload).map_err(PipelineError::stage)?;
        let plaintext = decrypt(&ciphertext)?;
        String::from_utf8(plaintext).map_err(PipelineError::stage)?
    } else {
        payload.to_owned()
    };
    let compressed = custom_base64_decode(&encoded)?;
    let inflated = decompress(&compressed)?;
    String::from_utf8(inflated).map_err(PipelineError::stage)
}

fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).expect("writing to an in-memory buffer never fails");
    encoder.finish().expect("writing to an in-memory buffer never fails")
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(PipelineError::stage)?;
    Ok(out)
}

fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut iv);
    let mut buffer = plaintext.to_vec();
    CfbEncryptor::new(&FIXED_KEY.into(), &iv.into()).encrypt(&mut buffer);
    let mut out = Vec::with_capacity(16 + buffer.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&buffer);
    out
}

fn decrypt(payload: &[u8]) -> Result<Vec<u8>, PipelineError> {
    if payload.len() < 16 {
        return Err(PipelineError::Config("encrypted link payload shorter than one IV".into()));
    }
    let (iv, ciphertext) = payload.split_at(16);
    let mut buffer = ciphertext.to_vec();
    CfbDecryptor::new(&FIXED_KEY.into(), iv.into()).decrypt(&mut buffer);
    Ok(buffer)
}

/// PlantUML's own text-diagram alphabet, over zero-padded 3-byte groups: each group yields four
/// 6-bit indices `b1>>2`, `((b1&0x3)<<4)|(b2>>4)`, `((b2&0xF)<<2)|(b3>>6)`, `b3&0x3F`.
fn custom_base64_encode(data: &[u8]) -> String {
    let padded_len = (data.len() + 2) / 3 * 3;
    let mut padded = data.to_vec();
    padded.resize(padded_len, 0);

    let mut out = String::with_capacity(padded_len / 3 * 4);
    for group in padded.chunks(3) {
        let (b1, b2, b3) = (group[0], group[1], group[2]);
        out.push(ALPHABET[(b1 >> 2) as usize] as char);
        out.push(ALPHABET[(((b1 & 0x3) << 4) | (b2 >> 4)) as usize] as char);
        out.push(ALPHABET[(((b2 & 0xF) << 2) | (b3 >> 6)) as usize] as char);
        out.push(ALPHABET[(b3 & 0x3F) as usize] as char);
    }
    out
}

fn custom_base64_decode(text: &str) -> Result<Vec<u8>, PipelineError> {
    let mut indices = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let byte = u8::try_from(ch).map_err(PipelineError::stage)?;
        let index = ALPHABET
            .iter()
            .position(|&candidate| candidate == byte)
            .ok_or_else(|| PipelineError::Config(format!("{ch:?} is not in the link alphabet")))?;
        indices.push(index as u8);
    }
    if indices.len() % 4 != 0 {
        return Err(PipelineError::Config(
            "link payload length is not a multiple of 4".into(),
        ));
    }

    let mut out = Vec::with_capacity(indices.len() / 4 * 3);
    for group in indices.chunks(4) {
        let (i0, i1, i2, i3) = (group[0], group[1], group[2], group[3]);
        out.push((i0 << 2) | (i1 >> 4));
        out.push((i1 << 4) | (i2 >> 2));
        out.push((i2 << 6) | i3);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unencrypted_round_trip_reproduces_diagram() {
        let diagram = "@startuml\n:SimplePipe;\n@enduml\n";
        let url = link(diagram, false);
        let payload = url.strip_prefix(PLANTUML_BASE).unwrap();
        let recovered = decode(payload, false).unwrap();
        assert_eq!(recovered, diagram);
    }

    #[test]
    fn encrypted_round_trip_reproduces_diagram() {
        let diagram = "@startuml\nfork\n:A;\nfork again\n:B;\nend fork\n@enduml\n";
        let url = link(diagram, true);
        let payload = url.strip_prefix(PLANTUML_BASE).unwrap();
        let recovered = decode(payload, true).unwrap();
        assert_eq!(recovered, diagram);
    }

    #[test]
    fn custom_base64_zero_pads_short_groups() {
        let encoded = custom_base64_encode(b"a");
        assert_eq!(encoded.len(), 4);
        let decoded = custom_base64_decode(&encoded).unwrap();
        assert_eq!(&decoded[..1], b"a");
    }
}
