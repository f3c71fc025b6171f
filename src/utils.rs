//! Utility functions

use std::io::Read;

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Read and discard whatever remains of a request body.
///
/// Errors are swallowed: the body is being abandoned and the caller already
/// holds the error it will report. Returns the number of bytes discarded.
pub fn drain<R: Read + ?Sized>(body: &mut R) -> u64 {
    std::io::copy(body, &mut std::io::sink()).unwrap_or(0)
}

/// Async counterpart of [`drain`]
pub async fn drain_async<R>(body: &mut R) -> u64
where
    R: tokio::io::AsyncRead + Unpin + ?Sized,
{
    tokio::io::copy(body, &mut tokio::io::sink()).await.unwrap_or(0)
}
