//! Binary sample frame decoding
//!
//! The data endpoint returns a bare sequence of little-endian IEEE-754 doubles
//! whose byte length is declared up front. The whole buffer is read before any
//! sample is produced; a short stream is an error, never a short result.

use crate::error::{Error, FrameError, Result};
use futures::TryStreamExt;
use reqwest::Response;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

/// Width of one sample in bytes
pub const SAMPLE_WIDTH: u64 = std::mem::size_of::<f64>() as u64;

/// Decode `declared_len` bytes from `reader` into samples
pub async fn decode<R>(reader: &mut R, declared_len: Option<u64>) -> Result<Vec<f64>>
where
    R: AsyncRead + Unpin,
{
    let declared_len = declared_len.ok_or(FrameError::LengthUnknown)?;

    if declared_len % SAMPLE_WIDTH != 0 {
        return Err(FrameError::LengthInvalid(declared_len).into());
    }

    if declared_len == 0 {
        return Ok(Vec::new());
    }

    let len = usize::try_from(declared_len).map_err(|_| FrameError::LengthInvalid(declared_len))?;
    let mut buffer = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        let read = reader.read(&mut buffer[filled..]).await.map_err(body_error)?;
        if read == 0 {
            return Err(FrameError::StreamEndedEarly {
                expected: declared_len,
                received: filled as u64,
            }
            .into());
        }
        filled += read;
    }

    Ok(buffer
        .chunks_exact(SAMPLE_WIDTH as usize)
        .map(|chunk| {
            let mut bytes = [0u8; SAMPLE_WIDTH as usize];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect())
}

/// Decode the body of a data response, using its Content-Length as the declared length
pub async fn decode_response(response: Response) -> Result<Vec<f64>> {
    let declared_len = response.content_length();
    let mut reader = body_reader(response);
    decode(&mut reader, declared_len).await
}

/// Adapt a streamed response body into an `AsyncRead`
///
/// Transport failures surface as I/O errors wrapping the `reqwest::Error`;
/// [`body_error`] unwraps them again.
pub(crate) fn body_reader(response: Response) -> impl AsyncRead + Unpin {
    StreamReader::new(Box::pin(
        response.bytes_stream().map_err(std::io::Error::other),
    ))
}

/// Map a read error from [`body_reader`] back to [`Error::Network`] where it
/// came from the transport
pub(crate) fn body_error(error: std::io::Error) -> Error {
    if !error
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>())
    {
        return Error::Io(error);
    }

    match error.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(network)) => Error::Network(*network),
        Some(Err(other)) => Error::Io(std::io::Error::other(other)),
        None => Error::Io(std::io::Error::other("body read failed")),
    }
}
