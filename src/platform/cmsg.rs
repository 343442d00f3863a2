//! Minimal control-message helpers around the libc `CMSG_*` macros.

use std::mem;
use std::ptr;

/// Control buffer with the alignment `cmsghdr` requires.
#[derive(Copy, Clone)]
#[repr(align(8))]
pub(crate) struct Aligned<T>(pub(crate) T);

/// Iterator over the control messages attached to a `msghdr`.
pub(crate) struct Iter<'a> {
    hdr: &'a libc::msghdr,
    cmsg: Option<&'a libc::cmsghdr>,
}

impl<'a> Iter<'a> {
    /// # Safety
    ///
    /// `hdr.msg_control` and `hdr.msg_controllen` must describe a valid,
    /// initialized control buffer that outlives the iterator.
    pub(crate) unsafe fn new(hdr: &'a libc::msghdr) -> Self {
        Self {
            hdr,
            cmsg: unsafe { libc::CMSG_FIRSTHDR(hdr).as_ref() },
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a libc::cmsghdr;

    fn next(&mut self) -> Option<&'a libc::cmsghdr> {
        let current = self.cmsg.take()?;
        self.cmsg = unsafe { libc::CMSG_NXTHDR(self.hdr, current).as_ref() };
        Some(current)
    }
}

/// Decode the payload of a control message as a `T`.
///
/// # Safety
///
/// The message must carry at least `size_of::<T>()` bytes of data, and `T`
/// must be a plain-old-data type.
pub(crate) unsafe fn decode<T: Copy>(cmsg: &libc::cmsghdr) -> T {
    let needed = unsafe { libc::CMSG_LEN(mem::size_of::<T>() as _) as usize };
    debug_assert!(cmsg.cmsg_len as usize >= needed);
    unsafe { ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const T) }
}
