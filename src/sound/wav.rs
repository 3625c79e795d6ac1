//! WAV container decoder
//!
//! Decodes RIFF WAVE containers into an [`AudioBuffer`]. Supports:
//! - Linear PCM and IEEE float PCM
//! - MS-ADPCM and IMA4 block-compressed payloads (kept compressed)
//! - Mono and stereo
//!
//! Unknown chunks are skipped byte-for-byte. Parsing stops at the `data`
//! chunk; anything after it is never read.

use std::io::{self, Read};

use super::buffer::{sample_duration, AudioBuffer};
use super::decoder::{DecodeError, DecodeResult};
use super::formats::{sample_alignment, AudioFormat, Encoding};

// Chunk tags as they appear in the stream
const RIFF_ID: [u8; 4] = *b"RIFF";
const WAVE_ID: [u8; 4] = *b"WAVE";
const FMT_ID: [u8; 4] = *b"fmt ";
const FACT_ID: [u8; 4] = *b"fact";
const DATA_ID: [u8; 4] = *b"data";

/// Size of the fixed part of a `fmt ` chunk
const FMT_BASE_SIZE: u32 = 16;

/// Fields collected while walking the chunk list
#[derive(Debug, Default)]
struct WavFormatHeader {
    encoding_tag: u16,
    channels: u16,
    sample_rate: u32,
    #[allow(dead_code)]
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
    samples_per_block: usize,
    sample_count: usize,
}

/// Little-endian reader over a container byte stream
struct ChunkReader<R> {
    inner: R,
}

impl<R: Read> ChunkReader<R> {
    fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_exact(&mut self, buf: &mut [u8], what: &'static str) -> DecodeResult<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::UnexpectedEof(what),
            _ => DecodeError::MalformedContainer(format!("read failed in {}: {}", what, e)),
        })
    }

    fn read_tag(&mut self, what: &'static str) -> DecodeResult<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, what)?;
        Ok(buf)
    }

    fn read_le_u16(&mut self, what: &'static str) -> DecodeResult<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf, what)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_le_u32(&mut self, what: &'static str) -> DecodeResult<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, what)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Discard `count` bytes without requiring the stream to seek
    fn skip(&mut self, count: u64, what: &'static str) -> DecodeResult<()> {
        if count == 0 {
            return Ok(());
        }
        let skipped = io::copy(&mut (&mut self.inner).take(count), &mut io::sink())
            .map_err(|e| DecodeError::MalformedContainer(format!("skip failed in {}: {}", what, e)))?;
        if skipped < count {
            return Err(DecodeError::UnexpectedEof(what));
        }
        Ok(())
    }

    fn read_payload(&mut self, size: u32) -> DecodeResult<Vec<u8>> {
        let mut data = Vec::with_capacity(size as usize);
        (&mut self.inner)
            .take(size as u64)
            .read_to_end(&mut data)
            .map_err(|e| DecodeError::MalformedContainer(format!("data chunk read failed: {}", e)))?;
        if data.len() < size as usize {
            return Err(DecodeError::UnexpectedEof("data chunk"));
        }
        Ok(data)
    }
}

/// WAV decoder
///
/// Stateless; decoding is a pure function of the input bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl WavDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Returns the decoder name
    pub fn name(&self) -> &'static str {
        "Wave"
    }

    /// Decode an in-memory container
    pub fn decode_bytes(&self, data: &[u8], name: &str) -> DecodeResult<AudioBuffer> {
        self.decode(data, name)
    }

    /// Decode a container from any byte stream
    pub fn decode<R: Read>(&self, reader: R, name: &str) -> DecodeResult<AudioBuffer> {
        let mut reader = ChunkReader::new(reader);
        Self::parse_file_header(&mut reader)?;

        let mut header = WavFormatHeader::default();
        let data = loop {
            let chunk_id = reader.read_tag("chunk header")?;
            let chunk_size = reader.read_le_u32("chunk header")?;

            match chunk_id {
                FMT_ID => Self::parse_format_chunk(&mut reader, chunk_size, &mut header)?,
                FACT_ID => Self::parse_fact_chunk(&mut reader, chunk_size, &mut header)?,
                DATA_ID => break reader.read_payload(chunk_size)?,
                _ => {
                    log::debug!(
                        "{}: skipping '{}' chunk ({} bytes)",
                        name,
                        String::from_utf8_lossy(&chunk_id),
                        chunk_size
                    );
                    reader.skip(chunk_size as u64, "unknown chunk")?;
                }
            }
        };

        let buffer = Self::finish(header, data, name)?;
        log::debug!(
            "decoded '{}': {:?} {:?}, {} Hz, {} samples",
            name,
            buffer.encoding,
            buffer.format,
            buffer.sample_rate,
            buffer.sample_count
        );
        Ok(buffer)
    }

    /// Validate the RIFF and WAVE signatures
    fn parse_file_header<R: Read>(reader: &mut ChunkReader<R>) -> DecodeResult<()> {
        let short = |_| DecodeError::MalformedContainer("stream too short for RIFF header".to_string());

        let id = reader.read_tag("RIFF header").map_err(short)?;
        if id != RIFF_ID {
            return Err(DecodeError::MalformedContainer("Not a RIFF file".to_string()));
        }
        // riff chunk size; not trusted
        reader.read_le_u32("RIFF header").map_err(short)?;

        let format = reader.read_tag("RIFF header").map_err(short)?;
        if format != WAVE_ID {
            return Err(DecodeError::MalformedContainer("Not a WAVE file".to_string()));
        }
        Ok(())
    }

    fn parse_format_chunk<R: Read>(
        reader: &mut ChunkReader<R>,
        size: u32,
        header: &mut WavFormatHeader,
    ) -> DecodeResult<()> {
        if size < FMT_BASE_SIZE {
            return Err(DecodeError::MalformedContainer(format!(
                "Format chunk too small: {} bytes",
                size
            )));
        }

        header.encoding_tag = reader.read_le_u16("fmt chunk")?;
        header.channels = reader.read_le_u16("fmt chunk")?;
        header.sample_rate = reader.read_le_u32("fmt chunk")?;
        header.byte_rate = reader.read_le_u32("fmt chunk")?;
        header.block_align = reader.read_le_u16("fmt chunk")?;
        header.bits_per_sample = reader.read_le_u16("fmt chunk")?;
        let mut consumed = FMT_BASE_SIZE;

        // cbSize is not trusted; the IMA4 samples-per-block field is read
        // whenever the chunk is long enough to hold it
        if size >= FMT_BASE_SIZE + 2 {
            let _extra_size = reader.read_le_u16("fmt chunk")?;
            consumed += 2;
            if header.encoding_tag == Encoding::IMA4_TAG && size >= consumed + 2 {
                header.samples_per_block = reader.read_le_u16("fmt chunk")? as usize;
                consumed += 2;
            }
        }

        reader.skip((size - consumed) as u64, "fmt chunk")
    }

    fn parse_fact_chunk<R: Read>(
        reader: &mut ChunkReader<R>,
        size: u32,
        header: &mut WavFormatHeader,
    ) -> DecodeResult<()> {
        let mut remaining = size;
        if header.encoding_tag == Encoding::IMA4_TAG && size >= 4 {
            let frames = reader.read_le_u32("fact chunk")? as usize;
            header.sample_count = frames * header.channels as usize;
            remaining -= 4;
        }
        reader.skip(remaining as u64, "fact chunk")
    }

    /// Derive the fields the stream did not state explicitly
    fn finish(header: WavFormatHeader, data: Vec<u8>, name: &str) -> DecodeResult<AudioBuffer> {
        let format = AudioFormat::from_layout(header.channels, header.bits_per_sample).ok_or(
            DecodeError::UnsupportedFormat {
                channels: header.channels,
                bits_per_sample: header.bits_per_sample,
            },
        )?;
        let encoding = Encoding::from_tag(header.encoding_tag);
        let block_alignment = header.block_align as usize;

        let samples_per_block = match header.samples_per_block {
            0 => sample_alignment(encoding, header.channels, block_alignment),
            n => n,
        };

        let sample_count = match header.sample_count {
            0 => match encoding {
                Encoding::Ima4 | Encoding::MsAdpcm => {
                    if block_alignment == 0 {
                        return Err(DecodeError::MalformedContainer(
                            "compressed data with zero block alignment".to_string(),
                        ));
                    }
                    (data.len() / block_alignment) * samples_per_block
                        + sample_alignment(encoding, header.channels, data.len() % block_alignment)
                }
                Encoding::Pcm | Encoding::IeeeFloat => {
                    let frame_bytes = (header.channels as usize * header.bits_per_sample as usize) / 8;
                    if frame_bytes == 0 {
                        return Err(DecodeError::MalformedContainer(format!(
                            "zero-sized sample frame ({} bits)",
                            header.bits_per_sample
                        )));
                    }
                    data.len() / frame_bytes
                }
                Encoding::Other(tag) => return Err(DecodeError::UnhandledEncoding(tag)),
            },
            n => n,
        };

        sample_duration(data.len(), header.sample_rate, header.channels)?;

        Ok(AudioBuffer {
            data,
            encoding,
            format,
            channels: header.channels,
            sample_rate: header.sample_rate,
            bits_per_sample: header.bits_per_sample,
            block_alignment: header.block_align,
            samples_per_block,
            sample_count,
            name: name.to_string(),
        })
    }
}
