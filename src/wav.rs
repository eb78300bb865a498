//! WAV encoder — 16-bit PCM RIFF/WAVE with an optional LIST/INFO comment.

use crate::buffer::SampleBuffer;
use crate::error::{RadioFryError, Result};

const BITS_PER_SAMPLE: u16 = 16;

/// Convert one float sample to signed 16-bit.
///
/// Positive samples scale by 32767, negative by 32768, so full scale maps
/// to the full i16 range. Out-of-range input clamps; the fraction truncates.
pub fn sample_to_i16(sample: f32) -> i16 {
    let scaled = if sample < 0.0 { sample * 32768.0 } else { sample * 32767.0 };
    scaled.clamp(-32768.0, 32767.0) as i16
}

/// Interleave a buffer into 16-bit PCM samples.
pub fn to_pcm_i16(buffer: &SampleBuffer) -> Vec<i16> {
    buffer.interleaved().into_iter().map(sample_to_i16).collect()
}

/// Size in bytes of the PCM payload, if it fits a RIFF size field.
fn data_len(buffer: &SampleBuffer) -> Result<u32> {
    buffer
        .frame_count()
        .checked_mul(buffer.channel_count())
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n <= u32::MAX - 1024)
        .ok_or_else(|| RadioFryError::InvalidBuffer("too long for a WAV file".into()))
}

fn write_fmt_chunk(buf: &mut Vec<u8>, channels: u16, sample_rate: u32) -> Result<()> {
    let byte_rate = sample_rate
        .checked_mul(channels as u32 * (BITS_PER_SAMPLE as u32 / 8))
        .ok_or_else(|| RadioFryError::InvalidBuffer("sample rate too high for a WAV file".into()))?;
    let block_align = channels * (BITS_PER_SAMPLE / 8);

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    Ok(())
}

fn channel_count_u16(buffer: &SampleBuffer) -> Result<u16> {
    u16::try_from(buffer.channel_count())
        .map_err(|_| RadioFryError::InvalidBuffer("too many channels for a WAV file".into()))
}

/// Encode with the plain 44-byte header: `RIFF`, `fmt `, `data`, nothing after.
pub fn encode(buffer: &SampleBuffer) -> Result<Vec<u8>> {
    let channels = channel_count_u16(buffer)?;
    let data_size = data_len(buffer)?;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    write_fmt_chunk(&mut buf, channels, buffer.sample_rate())?;

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for sample in to_pcm_i16(buffer) {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    Ok(buf)
}

/// Encode with a trailing `LIST`/`INFO`/`ICMT` chunk carrying `comment`.
///
/// The comment is stored as UTF-8 with a terminating NUL and padded to an
/// even length. The `ICMT` size excludes the pad byte; the `LIST` size
/// includes it.
pub fn encode_with_comment(buffer: &SampleBuffer, comment: &str) -> Result<Vec<u8>> {
    let channels = channel_count_u16(buffer)?;
    let data_size = data_len(buffer)?;
    let data_pad = data_size % 2;

    let mut text = comment.as_bytes().to_vec();
    text.push(0);
    let text_len = u32::try_from(text.len())
        .map_err(|_| RadioFryError::InvalidBuffer("comment too long".into()))?;
    let text_pad = text_len % 2;
    let icmt_size = 4 + 4 + text_len + text_pad;
    let list_size = 4 + icmt_size;
    let riff_size = 4 + (8 + 16) + (8 + data_size + data_pad) + (8 + list_size);

    let mut buf = Vec::with_capacity(8 + riff_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&riff_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    write_fmt_chunk(&mut buf, channels, buffer.sample_rate())?;

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for sample in to_pcm_i16(buffer) {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    if data_pad == 1 {
        buf.push(0);
    }

    buf.extend_from_slice(b"LIST");
    buf.extend_from_slice(&list_size.to_le_bytes());
    buf.extend_from_slice(b"INFO");
    buf.extend_from_slice(b"ICMT");
    buf.extend_from_slice(&text_len.to_le_bytes());
    buf.extend_from_slice(&text);
    if text_pad == 1 {
        buf.push(0);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(wav: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([wav[at], wav[at + 1], wav[at + 2], wav[at + 3]])
    }

    fn i16_at(wav: &[u8], at: usize) -> i16 {
        i16::from_le_bytes([wav[at], wav[at + 1]])
    }

    #[test]
    fn two_sample_mono_with_comment_is_byte_exact() {
        let buf = SampleBuffer::new(vec![vec![0.5, -1.0]], 8000).unwrap();
        let wav = encode_with_comment(&buf, "t").unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"RIFF");
        expected.extend_from_slice(&62u32.to_le_bytes()); // 4 + 24 + 12 + 22
        expected.extend_from_slice(b"WAVE");
        expected.extend_from_slice(b"fmt ");
        expected.extend_from_slice(&16u32.to_le_bytes());
        expected.extend_from_slice(&1u16.to_le_bytes());
        expected.extend_from_slice(&1u16.to_le_bytes());
        expected.extend_from_slice(&8000u32.to_le_bytes());
        expected.extend_from_slice(&16000u32.to_le_bytes());
        expected.extend_from_slice(&2u16.to_le_bytes());
        expected.extend_from_slice(&16u16.to_le_bytes());
        expected.extend_from_slice(b"data");
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice(&16383i16.to_le_bytes());
        expected.extend_from_slice(&(-32768i16).to_le_bytes());
        expected.extend_from_slice(b"LIST");
        expected.extend_from_slice(&14u32.to_le_bytes());
        expected.extend_from_slice(b"INFO");
        expected.extend_from_slice(b"ICMT");
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(b"t\0");

        assert_eq!(wav, expected);
        assert_eq!(wav.len(), 8 + 62);
    }

    #[test]
    fn odd_comment_gets_padded_but_not_counted() {
        let buf = SampleBuffer::new(vec![vec![0.0]], 44100).unwrap();
        let wav = encode_with_comment(&buf, "ab").unwrap(); // "ab\0" = 3 bytes

        let list_at = 44 + 2;
        assert_eq!(&wav[list_at..list_at + 4], b"LIST");
        assert_eq!(u32_at(&wav, list_at + 4), 4 + 8 + 4);
        assert_eq!(u32_at(&wav, list_at + 16), 3, "ICMT size excludes the pad");
        assert_eq!(&wav[list_at + 20..], b"ab\0\0");
        assert_eq!(u32_at(&wav, 4) as usize, wav.len() - 8);
    }

    #[test]
    fn utf8_comment_is_stored_verbatim() {
        let buf = SampleBuffer::new(vec![vec![0.0]], 44100).unwrap();
        let comment = "Iron Signal Works — ok";
        let wav = encode_with_comment(&buf, comment).unwrap();
        let text = &wav[44 + 2 + 20..];
        assert!(text.starts_with(comment.as_bytes()));
        assert_eq!(text[comment.len()], 0);
        assert_eq!(text.len() % 2, 0);
    }

    #[test]
    fn samples_clamp_to_i16_range() {
        assert_eq!(sample_to_i16(2.0), 32767);
        assert_eq!(sample_to_i16(-2.0), -32768);
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(-1.0), -32768);
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(f32::NAN), 0);
    }

    #[test]
    fn stereo_samples_interleave() {
        let buf = SampleBuffer::new(vec![vec![0.5, 0.0], vec![-0.5, 1.0]], 22050).unwrap();
        let wav = encode(&buf).unwrap();
        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(u32_at(&wav, 4), 36 + 8);
        assert_eq!(u32_at(&wav, 28), 22050 * 4, "byte rate");
        assert_eq!(i16_at(&wav, 44), 16383);
        assert_eq!(i16_at(&wav, 46), -16384);
        assert_eq!(i16_at(&wav, 48), 0);
        assert_eq!(i16_at(&wav, 50), 32767);
    }

    #[test]
    fn plain_header_has_no_metadata() {
        let buf = SampleBuffer::silent(1, 3, 8000).unwrap();
        let wav = encode(&buf).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 6);
        assert_eq!(wav.len(), 50);
    }

    #[test]
    fn byte_rate_overflow_is_an_error() {
        let buf = SampleBuffer::silent(2, 1, 3_000_000_000).unwrap();
        assert!(matches!(encode(&buf), Err(RadioFryError::InvalidBuffer(_))));
        assert!(matches!(encode_with_comment(&buf, "x"), Err(RadioFryError::InvalidBuffer(_))));
    }

    #[test]
    fn empty_buffer_encodes_header_only() {
        let buf = SampleBuffer::silent(2, 0, 44100).unwrap();
        let wav = encode_with_comment(&buf, "").unwrap();
        assert_eq!(u32_at(&wav, 40), 0);
        // "\0" pads to two bytes
        assert_eq!(wav.len(), 44 + 8 + 4 + 8 + 2);
    }
}
