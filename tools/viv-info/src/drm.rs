//! Render-node scanning and the etnaviv GET_PARAM ioctl.

use std::ffi::CString;
use std::io;
use std::mem;
use std::ptr;

use crate::params::ParamSource;

const DRM_IOCTL_BASE: u64 = 0x64; // 'd'
const DRM_COMMAND_BASE: u64 = 0x40;

const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;

const fn ioc(dir: u64, nr: u64, size: usize) -> u64 {
    dir << 30 | (size as u64) << 16 | DRM_IOCTL_BASE << 8 | nr
}

/// `struct drm_version` from the DRM UAPI.
#[repr(C)]
struct DrmVersion {
    version_major: libc::c_int,
    version_minor: libc::c_int,
    version_patchlevel: libc::c_int,
    name_len: usize,
    name: *mut libc::c_char,
    date_len: usize,
    date: *mut libc::c_char,
    desc_len: usize,
    desc: *mut libc::c_char,
}

/// `struct drm_etnaviv_param` from the etnaviv UAPI.
#[repr(C)]
struct DrmEtnavivParam {
    pipe: u32,
    param: u32,
    value: u64,
}

const DRM_IOCTL_VERSION: u64 = ioc(IOC_READ | IOC_WRITE, 0x00, mem::size_of::<DrmVersion>());
const DRM_IOCTL_ETNAVIV_GET_PARAM: u64 = ioc(
    IOC_READ | IOC_WRITE,
    DRM_COMMAND_BASE,
    mem::size_of::<DrmEtnavivParam>(),
);

/// An open DRM device file.
pub struct DrmDevice {
    fd: libc::c_int,
}

impl DrmDevice {
    /// Opens `path` and returns the device if it is bound to `driver`.
    fn open_if_driver(path: &str, driver: &str) -> Option<DrmDevice> {
        let c_path = CString::new(path).ok()?;
        // SAFETY: `c_path` is a valid NUL-terminated string.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return None;
        }
        let device = DrmDevice { fd };
        match device.driver_name() {
            Ok(name) if name == driver => Some(device),
            _ => None,
        }
    }

    /// Kernel driver name behind this device, via the two-call version
    /// protocol: the first ioctl reports the length, the second fills the
    /// buffer.
    fn driver_name(&self) -> io::Result<String> {
        let mut version = DrmVersion {
            version_major: 0,
            version_minor: 0,
            version_patchlevel: 0,
            name_len: 0,
            name: ptr::null_mut(),
            date_len: 0,
            date: ptr::null_mut(),
            desc_len: 0,
            desc: ptr::null_mut(),
        };
        // SAFETY: `version` matches the kernel's struct layout; with the
        // lengths zeroed the kernel only writes the fixed fields.
        let rc = unsafe { libc::ioctl(self.fd, DRM_IOCTL_VERSION as _, &mut version) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut name = vec![0u8; version.name_len];
        version.name = name.as_mut_ptr().cast();
        version.date_len = 0;
        version.desc_len = 0;
        // SAFETY: `name` outlives the call and `name_len` matches its
        // capacity; the other strings stay disabled with zero lengths.
        let rc = unsafe { libc::ioctl(self.fd, DRM_IOCTL_VERSION as _, &mut version) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        name.truncate(len);
        Ok(String::from_utf8_lossy(&name).into_owned())
    }
}

impl Drop for DrmDevice {
    fn drop(&mut self) {
        // SAFETY: `fd` is owned by this struct and closed exactly once.
        unsafe { libc::close(self.fd) };
    }
}

impl ParamSource for DrmDevice {
    fn get_param(&mut self, pipe: u32, param: u32) -> Option<u64> {
        let mut req = DrmEtnavivParam {
            pipe,
            param,
            value: 0,
        };
        loop {
            // SAFETY: `req` matches the kernel's struct layout and lives
            // across the call.
            let rc = unsafe { libc::ioctl(self.fd, DRM_IOCTL_ETNAVIV_GET_PARAM as _, &mut req) };
            if rc == 0 {
                return Some(req.value);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) | Some(libc::EAGAIN) => continue,
                _ => return None,
            }
        }
    }
}

/// First render node bound to the etnaviv driver, if any.
pub fn open_etnaviv() -> Option<DrmDevice> {
    (0..64).find_map(|minor| {
        let path = format!("/dev/dri/renderD{}", 128 + minor);
        DrmDevice::open_if_driver(&path, "etnaviv")
    })
}
