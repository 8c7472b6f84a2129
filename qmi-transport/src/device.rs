// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device channel (C1): non-blocking reads and scatter/gather writes
//! over the character device, registered with the async runtime's reactor
//! directly rather than going through a buffered file abstraction.

use std::io::{self, IoSlice};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::Path;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::sys::uio::writev;
use nix::unistd::read as nix_read;
use tokio::io::unix::AsyncFd;

pub struct DeviceChannel {
    fd: AsyncFd<OwnedFd>,
}

impl DeviceChannel {
    /// Opens `path` non-blocking. `O_NOCTTY` keeps a serial-ish cdc-wdm
    /// device from becoming this process's controlling terminal.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let raw = open(path, OFlag::O_RDWR | OFlag::O_NONBLOCK | OFlag::O_NOCTTY, Mode::empty())
            .map_err(io::Error::from)?;
        // SAFETY: `open` just returned a freshly opened, uniquely owned fd.
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(DeviceChannel { fd: AsyncFd::new(owned)? })
    }

    /// Reads into `buf`, waiting for readability first. `Ok(0)` means the
    /// device hung up, the channel's `{closed}` event.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| {
                nix_read(inner.get_ref().as_raw_fd(), buf).map_err(io::Error::from)
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }

    /// Writes every chunk in `chunks` as a single `writev`, retrying short
    /// writes until the whole scatter/gather payload has been accepted.
    pub async fn write_all_vectored(&mut self, chunks: &[&[u8]]) -> io::Result<()> {
        let mut offsets = vec![0usize; chunks.len()];
        loop {
            let slices: Vec<IoSlice<'_>> = chunks
                .iter()
                .zip(offsets.iter())
                .filter(|(chunk, off)| **off < chunk.len())
                .map(|(chunk, off)| IoSlice::new(&chunk[*off..]))
                .collect();
            if slices.is_empty() {
                return Ok(());
            }
            let mut guard = self.fd.writable().await?;
            let written = match guard
                .try_io(|inner| writev(inner.get_ref(), &slices).map_err(io::Error::from))
            {
                Ok(result) => result?,
                Err(_would_block) => continue,
            };
            advance_offsets(&mut offsets, chunks, written);
        }
    }
}

fn advance_offsets(offsets: &mut [usize], chunks: &[&[u8]], mut written: usize) {
    for (offset, chunk) in offsets.iter_mut().zip(chunks.iter()) {
        let remaining = chunk.len() - *offset;
        let take = remaining.min(written);
        *offset += take;
        written -= take;
        if written == 0 {
            break;
        }
    }
}
