//! Encrypted provider streams: AES-128-CTR decryption, Ogg header repair and tagging.
//!
//! Provider CDN files are Ogg/Vorbis with a scrambled container header. After
//! decrypting with the per-track key, the fixed header bytes are written back and
//! ffmpeg remuxes the stream so players accept it.

use std::path::Path;
use std::process::Stdio;

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use tokio::process::Command;

use super::error::DownloadError;
use crate::provider::TrackDetail;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Initial counter block shared by every provider stream.
const AUDIO_AES_IV: [u8; 16] = [
    0x72, 0xe0, 0x67, 0xfb, 0xdd, 0xcb, 0xcf, 0x77, 0xeb, 0xe8, 0xbc, 0x64, 0x3f, 0x63, 0x0d, 0x93,
];

/// Bytes rewritten at fixed offsets of the decrypted file.
const OGG_HEADER_PATCHES: &[(usize, &[u8])] = &[
    (0, b"OggS"),
    (6, &[0; 10]),
    (26, b"\x01\x1E\x01vorbis"),
    (39, b"\x02"),
    (40, b"\x44\xAC\x00\x00"),
    (48, b"\x00\xE2\x04\x00"),
    (56, b"\xB8\x01"),
    (58, b"OggS"),
    (62, &[0; 10]),
];

/// Smallest buffer the header patch can apply to.
pub const MIN_STREAM_LEN: usize = 72;

/// Decrypts `data` in place with the hex `key`.
pub fn decrypt(data: &mut [u8], hex_key: &str) -> Result<(), DownloadError> {
    let key = hex::decode(hex_key.trim()).map_err(|e| DownloadError::Decrypt(format!("invalid hex key: {}", e)))?;
    let mut cipher = Aes128Ctr::new_from_slices(&key, &AUDIO_AES_IV)
        .map_err(|_| DownloadError::Decrypt(format!("key must be 16 bytes, got {}", key.len())))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Writes the canonical Ogg/Vorbis header bytes over a decrypted stream.
pub fn patch_ogg_header(data: &mut [u8]) -> Result<(), DownloadError> {
    if data.len() < MIN_STREAM_LEN {
        return Err(DownloadError::Decrypt(format!(
            "stream too short for an Ogg header: {} bytes",
            data.len()
        )));
    }
    for (offset, bytes) in OGG_HEADER_PATCHES {
        data[*offset..*offset + bytes.len()].copy_from_slice(bytes);
    }
    Ok(())
}

/// Decrypts and repairs the encrypted file at `encrypted`, writing the result to `output`.
pub async fn decrypt_file(encrypted: &Path, output: &Path, hex_key: &str) -> Result<(), DownloadError> {
    let data = fs_err::tokio::read(encrypted).await?;
    let key = hex_key.to_string();
    let data = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, DownloadError> {
        let mut data = data;
        decrypt(&mut data, &key)?;
        patch_ogg_header(&mut data)?;
        Ok(data)
    })
    .await
    .map_err(|e| DownloadError::Decrypt(format!("decrypt task failed: {}", e)))??;
    fs_err::tokio::write(output, data).await?;
    Ok(())
}

/// Builds the ffmpeg arguments that remux `input` into `output` with track tags.
pub fn remux_args(input: &Path, output: &Path, track: &TrackDetail) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
    ];
    let tags = [
        ("title", track.name.as_str()),
        ("artist", track.artist.as_str()),
        ("album", track.album.as_str()),
        ("date", track.year.as_str()),
        ("lyrics", track.lyrics.as_str()),
    ];
    for (name, value) in tags {
        if !value.is_empty() {
            args.push("-metadata".into());
            args.push(format!("{}={}", name, value));
        }
    }
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Runs ffmpeg to remux and tag the repaired stream.
pub async fn remux(ffmpeg_bin: &str, input: &Path, output: &Path, track: &TrackDetail) -> Result<(), DownloadError> {
    let out = Command::new(ffmpeg_bin)
        .args(remux_args(input, output, track))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DownloadError::Process(format!("failed to start {}: {}", ffmpeg_bin, e)))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(DownloadError::Process(format!("ffmpeg failed: {}", stderr.trim())));
    }
    if !output.exists() {
        return Err(DownloadError::FileNotFound(output.display().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn test_decrypt_is_involution() {
        let original: Vec<u8> = (0..200u8).collect();
        let mut data = original.clone();
        decrypt(&mut data, KEY).unwrap();
        assert_ne!(data, original);
        decrypt(&mut data, KEY).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn test_decrypt_rejects_bad_keys() {
        let mut data = vec![0u8; 16];
        assert!(matches!(decrypt(&mut data, "zz"), Err(DownloadError::Decrypt(_))));
        assert!(matches!(decrypt(&mut data, "0011"), Err(DownloadError::Decrypt(_))));
    }

    #[test]
    fn test_patch_ogg_header_offsets() {
        let mut data = vec![0xFFu8; 128];
        patch_ogg_header(&mut data).unwrap();
        assert_eq!(&data[0..4], b"OggS");
        assert_eq!(&data[4..6], &[0xFF, 0xFF]);
        assert_eq!(&data[6..16], &[0u8; 10]);
        assert_eq!(&data[26..35], b"\x01\x1E\x01vorbis");
        assert_eq!(data[39], 0x02);
        assert_eq!(&data[40..44], b"\x44\xAC\x00\x00");
        assert_eq!(&data[48..52], b"\x00\xE2\x04\x00");
        assert_eq!(&data[56..58], b"\xB8\x01");
        assert_eq!(&data[58..62], b"OggS");
        assert_eq!(&data[62..72], &[0u8; 10]);
        assert_eq!(data[72], 0xFF);
    }

    #[test]
    fn test_patch_rejects_short_stream() {
        let mut data = vec![0u8; 10];
        assert!(patch_ogg_header(&mut data).is_err());
    }

    #[test]
    fn test_remux_args_skip_empty_tags() {
        let track: TrackDetail =
            serde_json::from_str(r#"{"name": "Song", "artist": "Band", "year": 2001}"#).unwrap();
        let args = remux_args(Path::new("in.tmp"), Path::new("out.ogg"), &track);
        assert!(args.contains(&"title=Song".to_string()));
        assert!(args.contains(&"date=2001".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("album=")));
        assert_eq!(args.last().map(String::as_str), Some("out.ogg"));
    }

    #[tokio::test]
    async fn test_decrypt_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let plain: Vec<u8> = (0..=255u8).cycle().take(512).collect();
        let mut encrypted = plain.clone();
        decrypt(&mut encrypted, KEY).unwrap();
        let enc_path = dir.path().join("t.enc");
        let out_path = dir.path().join("t.tmp");
        std::fs::write(&enc_path, &encrypted).unwrap();

        decrypt_file(&enc_path, &out_path, KEY).await.unwrap();
        let out = std::fs::read(&out_path).unwrap();
        assert_eq!(&out[0..4], b"OggS");
        assert_eq!(&out[100..], &plain[100..]);
    }
}
