
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};

use crate::config::EndOfStream;
use crate::error::{Error, Result};
use crate::{FRAME_BYTES, SAMPLES_PER_FRAME};

/// PcmFrame is one 20ms block of interleaved samples read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct PcmFrame {
    samples: Vec<f32>,
    valid_bytes: usize,
}

impl PcmFrame {
    /// samples always holds `SAMPLES_PER_FRAME` values; anything past
    /// `valid_bytes` is silence.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// valid_bytes is how many bytes of the frame came from the file
    pub fn valid_bytes(&self) -> usize {
        self.valid_bytes
    }

    pub fn is_complete(&self) -> bool {
        self.valid_bytes == FRAME_BYTES
    }
}

/// PcmReader is used to read raw little-endian f32 PCM and return it in
/// fixed size frames
pub struct PcmReader<R: Read + Seek> {
    reader: R,
    end_of_stream: EndOfStream,
    buf: Vec<u8>,
    bytes_since_rewind: u64,
    frames_read: u64,
    short_reads: u64,
    rewinds: u64,
}

impl<R: Read + Seek> PcmReader<R> {
    pub fn new(reader: R, end_of_stream: EndOfStream) -> Self {
        PcmReader {
            reader,
            end_of_stream,
            buf: vec![0u8; FRAME_BYTES],
            bytes_since_rewind: 0,
            frames_read: 0,
            short_reads: 0,
            rewinds: 0,
        }
    }

    /// next_frame returns the next frame of the file, or `None` once the
    /// stream is over. A partial trailing frame is zero padded.
    pub fn next_frame(&mut self) -> Result<Option<PcmFrame>> {
        loop {
            let n = self.fill()?;
            if n > 0 {
                self.bytes_since_rewind += n as u64;
                self.frames_read += 1;

                if n != FRAME_BYTES {
                    self.short_reads += 1;
                    log::warn!(
                        "only read {n} bytes from audio file, expected {FRAME_BYTES}; padding with silence"
                    );
                    self.buf[n..].fill(0);
                }

                let mut samples = vec![0f32; SAMPLES_PER_FRAME];
                LittleEndian::read_f32_into(&self.buf, &mut samples);

                return Ok(Some(PcmFrame {
                    samples,
                    valid_bytes: n,
                }));
            }

            match self.end_of_stream {
                EndOfStream::Stop => {
                    log::debug!("audio file exhausted after {} frames", self.frames_read);
                    return Ok(None);
                }
                EndOfStream::Loop => {
                    if self.bytes_since_rewind == 0 {
                        return Err(Error::ErrEmptyAudioFile);
                    }
                    self.reader.seek(SeekFrom::Start(0))?;
                    self.bytes_since_rewind = 0;
                    self.rewinds += 1;
                    log::debug!("audio file exhausted, rewinding (loop #{})", self.rewinds);
                }
            }
        }
    }

    /// fill reads until the frame buffer is full or the reader hits EOF
    fn fill(&mut self) -> Result<usize> {
        let mut n = 0;
        while n < FRAME_BYTES {
            match self.reader.read(&mut self.buf[n..]) {
                Ok(0) => break,
                Ok(m) => n += m,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(n)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// short_reads counts frames that were padded because the file length is
    /// not a multiple of the frame size
    pub fn short_reads(&self) -> u64 {
        self.short_reads
    }

    pub fn rewinds(&self) -> u64 {
        self.rewinds
    }
}
